use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;
use crate::paths::from_epoch_millis;
use crate::rows::{RowQuery, SqliteRows, i64_col, str_col};
use crate::traits::{ProviderKind, SessionRef};

pub const INDEX_FILE: &str = "state.sqlite";

/// Threads listed per workspace query
const MAX_THREADS: i64 = 500;

const THREADS_BY_CWD: &str = "SELECT id, rollout_path, cwd, updated_at FROM threads \
     WHERE cwd = ?1 OR cwd = ?2 ORDER BY updated_at DESC LIMIT ?3";

/// Companion thread index Codex keeps next to its rollouts
pub struct ThreadIndex<Q: RowQuery = SqliteRows> {
    rows: Q,
}

impl ThreadIndex<SqliteRows> {
    /// `None` when the index file is absent
    pub fn open(codex_dir: &Path, timeout: Duration) -> Option<Self> {
        let rows = SqliteRows::new(codex_dir.join(INDEX_FILE)).with_timeout(timeout);
        rows.exists().then_some(Self { rows })
    }
}

impl<Q: RowQuery> ThreadIndex<Q> {
    pub fn with_rows(rows: Q) -> Self {
        Self { rows }
    }

    /// Indexed sessions for a workspace whose rollout still exists, newest first
    pub fn sessions_for(&self, workspace: &Path, normalized: &Path) -> Result<Vec<SessionRef>> {
        let rows = self.rows.query_json(
            THREADS_BY_CWD,
            &[
                Value::from(workspace.to_string_lossy().into_owned()),
                Value::from(normalized.to_string_lossy().into_owned()),
                Value::from(MAX_THREADS),
            ],
        )?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let id = str_col(row, "id")?;
                let path = PathBuf::from(str_col(row, "rollout_path")?);
                if !path.is_file() {
                    return None;
                }
                let modified = i64_col(row, "updated_at")
                    .map(to_millis)
                    .map(from_epoch_millis)
                    .or_else(|| crate::paths::modified(&path));
                Some(SessionRef {
                    kind: ProviderKind::Codex,
                    id,
                    path,
                    modified,
                    workspace: str_col(row, "cwd").map(PathBuf::from),
                })
            })
            .collect())
    }
}

/// `updated_at` is written in seconds by some releases and milliseconds by others
fn to_millis(value: i64) -> i64 {
    if value < 100_000_000_000 { value * 1000 } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn index_with(dir: &Path, rows: &[(&str, &Path, &str, i64)]) {
        let conn = Connection::open(dir.join(INDEX_FILE)).unwrap();
        conn.execute_batch(
            "CREATE TABLE threads (
                id TEXT PRIMARY KEY, rollout_path TEXT, cwd TEXT, updated_at INTEGER);",
        )
        .unwrap();
        for (id, path, cwd, updated) in rows {
            conn.execute(
                "INSERT INTO threads (id, rollout_path, cwd, updated_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, path.to_string_lossy(), cwd, updated],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_missing_index_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ThreadIndex::open(dir.path(), Duration::from_millis(100)).is_none());
    }

    #[test]
    fn test_lists_existing_rollouts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.jsonl");
        let new = dir.path().join("new.jsonl");
        std::fs::write(&old, "").unwrap();
        std::fs::write(&new, "").unwrap();
        let gone = dir.path().join("gone.jsonl");
        index_with(
            dir.path(),
            &[
                ("a", &old, "/w", 1_700_000_000),
                ("b", &new, "/w", 1_700_000_100),
                ("c", &gone, "/w", 1_700_000_200),
                ("d", &new, "/other", 1_700_000_300),
            ],
        );

        let index = ThreadIndex::open(dir.path(), Duration::from_millis(500)).unwrap();
        let sessions = index.sessions_for(Path::new("/w"), Path::new("/w")).unwrap();
        let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(sessions[0].modified, Some(from_epoch_millis(1_700_000_100_000)));
    }

    #[test]
    fn test_unexpected_schema_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join(INDEX_FILE)).unwrap();
        conn.execute_batch("CREATE TABLE threads (thread TEXT);").unwrap();
        drop(conn);

        let index = ThreadIndex::open(dir.path(), Duration::from_millis(500)).unwrap();
        assert!(index.sessions_for(Path::new("/w"), Path::new("/w")).is_err());
    }
}
