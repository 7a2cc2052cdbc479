use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::schema::{MessageInfo, Part};
use super::store::{MessageStore, StoredMessage, StoredPart, StoredSession};
use crate::Result;
use crate::reader::RowMark;
use crate::rows::{RowQuery, SqliteRows, i64_col, json_col, str_col};

pub const DB_FILE: &str = "opencode.db";

const MAX_SESSIONS: i64 = 1000;

const SESSIONS: &str = "SELECT id, project_id, parent_id, directory, title, time_updated \
     FROM session ORDER BY time_updated DESC LIMIT ?1";

const SESSION: &str = "SELECT id, project_id, parent_id, directory, title, time_updated \
     FROM session WHERE id = ?1";

const MESSAGES_SINCE: &str = "SELECT id, time_updated, data FROM message \
     WHERE session_id = ?1 AND (time_updated > ?2 OR (time_updated = ?2 AND id > ?3)) \
     ORDER BY time_updated, id LIMIT ?4";

const PARTS_SINCE: &str = "SELECT p.id, p.message_id, p.time_updated, p.data FROM part p \
     JOIN message m ON m.id = p.message_id \
     WHERE m.session_id = ?1 AND (p.time_updated > ?2 OR (p.time_updated = ?2 AND p.id > ?3)) \
     ORDER BY p.time_updated, p.id LIMIT ?4";

const MESSAGE: &str =
    "SELECT id, time_updated, data FROM message WHERE session_id = ?1 AND id = ?2";

const PARTS_OF: &str =
    "SELECT id, message_id, time_updated, data FROM part WHERE message_id = ?1 ORDER BY id";

const LATEST_MESSAGE: &str = "SELECT id, time_updated FROM message WHERE session_id = ?1 \
     ORDER BY time_updated DESC, id DESC LIMIT 1";

const LATEST_PART: &str = "SELECT p.id, p.time_updated FROM part p \
     JOIN message m ON m.id = p.message_id WHERE m.session_id = ?1 \
     ORDER BY p.time_updated DESC, p.id DESC LIMIT 1";

/// `opencode.db`: project/session/message/part tables with JSON `data` payloads
pub struct SqliteStore<Q: RowQuery = SqliteRows> {
    rows: Q,
    path: PathBuf,
}

impl SqliteStore<SqliteRows> {
    /// `None` when the database is absent or lacks the message tables
    pub fn open(base: &Path, timeout: Duration) -> Option<Self> {
        let rows = SqliteRows::new(base.join(DB_FILE)).with_timeout(timeout);
        if !rows.exists() {
            return None;
        }
        if !(rows.has_table("message") && rows.has_table("part")) {
            tracing::debug!(
                path = %rows.path().display(),
                "opencode database has no message tables"
            );
            return None;
        }
        let path = rows.path().to_path_buf();
        Some(Self { rows, path })
    }
}

impl<Q: RowQuery> SqliteStore<Q> {
    pub fn with_rows(rows: Q, path: impl Into<PathBuf>) -> Self {
        Self { rows, path: path.into() }
    }

    fn session_row(&self, row: &Map<String, Value>) -> Option<StoredSession> {
        Some(StoredSession {
            id: str_col(row, "id")?,
            project_id: str_col(row, "project_id"),
            parent_id: str_col(row, "parent_id"),
            directory: str_col(row, "directory"),
            title: str_col(row, "title"),
            updated_ms: i64_col(row, "time_updated").unwrap_or(0),
            path: self.path.clone(),
        })
    }

    /// Key of the newest row, or the zero mark for an empty table
    fn latest(&self, sql: &str, session_id: &str) -> Result<RowMark> {
        let rows = self.rows.query_json(sql, &[Value::from(session_id)])?;
        Ok(rows
            .first()
            .map(|r| {
                RowMark::new(
                    i64_col(r, "time_updated").unwrap_or(0),
                    str_col(r, "id").unwrap_or_default(),
                )
            })
            .unwrap_or_default())
    }
}

fn message_row(row: &Map<String, Value>) -> Option<StoredMessage> {
    let id = str_col(row, "id")?;
    let data = json_col(row, "data")?;
    match serde_json::from_value::<MessageInfo>(data) {
        Ok(mut info) => {
            info.id = id;
            Some(StoredMessage {
                info,
                updated_ms: i64_col(row, "time_updated").unwrap_or(0),
            })
        }
        Err(e) => {
            tracing::warn!(message = %id, error = %e, "skipping malformed opencode message row");
            None
        }
    }
}

fn part_row(row: &Map<String, Value>) -> Option<StoredPart> {
    let id = str_col(row, "id")?;
    let data = json_col(row, "data")?;
    match serde_json::from_value::<Part>(data) {
        Ok(mut part) => {
            part.id = id;
            Some(StoredPart {
                message_id: str_col(row, "message_id")?,
                part,
                updated_ms: i64_col(row, "time_updated").unwrap_or(0),
            })
        }
        Err(e) => {
            tracing::warn!(part = %id, error = %e, "skipping malformed opencode part row");
            None
        }
    }
}

fn keyset_params(session_id: &str, after: &RowMark, limit: usize) -> [Value; 4] {
    [
        Value::from(session_id),
        Value::from(after.updated_ms),
        Value::from(after.id.as_str()),
        Value::from(i64::try_from(limit).unwrap_or(i64::MAX)),
    ]
}

impl<Q: RowQuery> MessageStore for SqliteStore<Q> {
    fn location(&self) -> PathBuf {
        self.path.clone()
    }

    fn sessions(&self) -> Result<Vec<StoredSession>> {
        let rows = self.rows.query_json(SESSIONS, &[Value::from(MAX_SESSIONS)])?;
        Ok(rows.iter().filter_map(|r| self.session_row(r)).collect())
    }

    fn session(&self, session_id: &str) -> Result<Option<StoredSession>> {
        let rows = self.rows.query_json(SESSION, &[Value::from(session_id)])?;
        Ok(rows.first().and_then(|r| self.session_row(r)))
    }

    fn messages_since(
        &self,
        session_id: &str,
        after: &RowMark,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let rows = self
            .rows
            .query_json(MESSAGES_SINCE, &keyset_params(session_id, after, limit))?;
        Ok(rows.iter().filter_map(message_row).collect())
    }

    fn parts_since(
        &self,
        session_id: &str,
        after: &RowMark,
        limit: usize,
    ) -> Result<Vec<StoredPart>> {
        let rows = self
            .rows
            .query_json(PARTS_SINCE, &keyset_params(session_id, after, limit))?;
        Ok(rows.iter().filter_map(part_row).collect())
    }

    fn message(&self, session_id: &str, message_id: &str) -> Result<Option<StoredMessage>> {
        let rows = self
            .rows
            .query_json(MESSAGE, &[Value::from(session_id), Value::from(message_id)])?;
        Ok(rows.first().and_then(message_row))
    }

    fn parts_of(&self, message_id: &str) -> Result<Vec<StoredPart>> {
        let rows = self.rows.query_json(PARTS_OF, &[Value::from(message_id)])?;
        Ok(rows.iter().filter_map(part_row).collect())
    }

    fn latest_updates(&self, session_id: &str) -> Result<(RowMark, RowMark)> {
        let message = self.latest(LATEST_MESSAGE, session_id)?;
        let part = self.latest(LATEST_PART, session_id)?;
        Ok((message, part))
    }
}

/// Row source that fails every query, standing in for a locked or corrupt database
#[cfg(test)]
pub(crate) struct FailingRows;

#[cfg(test)]
impl RowQuery for FailingRows {
    fn query_json(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Map<String, Value>>> {
        Err(crate::Error::Provider("database is locked".to_string()))
    }
}
