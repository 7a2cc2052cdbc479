use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use super::schema::{MessageInfo, Part, SessionFile};
use super::store::{MessageStore, StoredMessage, StoredPart, StoredSession};
use crate::Result;
use crate::paths::{epoch_millis, modified};
use crate::reader::RowMark;

pub const STORAGE_DIR: &str = "storage";

/// Per-record JSON files under `storage/`; file mtime is the update time
pub struct FileStore {
    storage: PathBuf,
}

impl FileStore {
    pub fn new(base: &Path) -> Self {
        Self {
            storage: base.join(STORAGE_DIR),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage
    }

    fn message_dir(&self, session_id: &str) -> PathBuf {
        self.storage.join("message").join(session_id)
    }

    fn part_dir(&self, message_id: &str) -> PathBuf {
        self.storage.join("part").join(message_id)
    }

    fn messages(&self, session_id: &str) -> Vec<StoredMessage> {
        json_files(&self.message_dir(session_id))
            .into_iter()
            .filter_map(|path| read_message(&path))
            .collect()
    }
}

/// `*.json` files of one directory, sorted by name (record id)
fn json_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

fn mtime_ms(path: &Path) -> i64 {
    modified(path).map(epoch_millis).unwrap_or(0)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cannot read opencode record");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "skipping malformed opencode record"
            );
            None
        }
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

fn read_message(path: &Path) -> Option<StoredMessage> {
    let mut info: MessageInfo = read_json(path)?;
    if info.id.is_empty() {
        info.id = file_stem(path)?;
    }
    Some(StoredMessage {
        info,
        updated_ms: mtime_ms(path),
    })
}

fn read_part(path: &Path, message_id: &str) -> Option<StoredPart> {
    let mut part: Part = read_json(path)?;
    if part.id.is_empty() {
        part.id = file_stem(path)?;
    }
    Some(StoredPart {
        message_id: message_id.to_string(),
        part,
        updated_ms: mtime_ms(path),
    })
}

fn read_session(path: &Path) -> Option<StoredSession> {
    let session: SessionFile = read_json(path)?;
    Some(StoredSession {
        updated_ms: session
            .time
            .and_then(|t| t.updated)
            .unwrap_or_else(|| mtime_ms(path))
            .max(mtime_ms(path)),
        id: session.id,
        project_id: session.project_id,
        parent_id: session.parent_id,
        directory: session.directory,
        title: session.title,
        path: path.to_path_buf(),
    })
}

/// Rows keyed after `after`, in `(updated_ms, id)` order, at most `limit`
fn keyset_page<T>(
    items: Vec<T>,
    key: impl Fn(&T) -> (i64, &str),
    after: &RowMark,
    limit: usize,
) -> Vec<T> {
    let mut page: Vec<T> = items
        .into_iter()
        .filter(|item| {
            let (updated_ms, id) = key(item);
            after.is_before(updated_ms, id)
        })
        .collect();
    page.sort_by(|a, b| key(a).cmp(&key(b)));
    page.truncate(limit);
    page
}

impl MessageStore for FileStore {
    fn location(&self) -> PathBuf {
        self.storage.join("session")
    }

    fn sessions(&self) -> Result<Vec<StoredSession>> {
        let Ok(projects) = std::fs::read_dir(self.storage.join("session")) else {
            return Ok(Vec::new());
        };
        let mut sessions: Vec<StoredSession> = projects
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .flat_map(|dir| json_files(&dir))
            .filter_map(|path| read_session(&path))
            .collect();
        sessions.sort_by(|a, b| b.updated_ms.cmp(&a.updated_ms).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    fn messages_since(
        &self,
        session_id: &str,
        after: &RowMark,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let messages = self.messages(session_id);
        Ok(keyset_page(messages, |m| (m.updated_ms, m.info.id.as_str()), after, limit))
    }

    fn parts_since(
        &self,
        session_id: &str,
        after: &RowMark,
        limit: usize,
    ) -> Result<Vec<StoredPart>> {
        let mut changed = Vec::new();
        for message in json_files(&self.message_dir(session_id)) {
            let Some(message_id) = file_stem(&message) else {
                continue;
            };
            for path in json_files(&self.part_dir(&message_id)) {
                if mtime_ms(&path) >= after.updated_ms
                    && let Some(part) = read_part(&path, &message_id)
                {
                    changed.push(part);
                }
            }
        }
        Ok(keyset_page(changed, |p| (p.updated_ms, p.part.id.as_str()), after, limit))
    }

    fn message(&self, session_id: &str, message_id: &str) -> Result<Option<StoredMessage>> {
        let path = self.message_dir(session_id).join(format!("{}.json", message_id));
        Ok(path.is_file().then(|| read_message(&path)).flatten())
    }

    fn parts_of(&self, message_id: &str) -> Result<Vec<StoredPart>> {
        Ok(json_files(&self.part_dir(message_id))
            .iter()
            .filter_map(|path| read_part(path, message_id))
            .collect())
    }

    fn latest_updates(&self, session_id: &str) -> Result<(RowMark, RowMark)> {
        let messages = self.messages(session_id);
        let latest_message = messages
            .iter()
            .map(|m| RowMark::new(m.updated_ms, m.info.id.as_str()))
            .max_by(|a, b| (a.updated_ms, &a.id).cmp(&(b.updated_ms, &b.id)))
            .unwrap_or_default();
        let latest_part = messages
            .iter()
            .flat_map(|m| self.parts_of(&m.info.id).unwrap_or_default())
            .map(|p| RowMark::new(p.updated_ms, p.part.id))
            .max_by(|a, b| (a.updated_ms, &a.id).cmp(&(b.updated_ms, &b.id)))
            .unwrap_or_default();
        Ok((latest_message, latest_part))
    }
}
