use std::path::PathBuf;

use super::schema::{MessageInfo, Part};
use crate::Result;
use crate::reader::RowMark;

/// Session metadata common to both stores
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub id: String,
    pub project_id: Option<String>,
    pub parent_id: Option<String>,
    pub directory: Option<String>,
    pub title: Option<String>,
    pub updated_ms: i64,
    /// Database file or session JSON file
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub info: MessageInfo,
    pub updated_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPart {
    pub message_id: String,
    pub part: Part,
    pub updated_ms: i64,
}

/// Read-only view over an OpenCode store
///
/// `*_since` queries return rows whose `(updated_ms, id)` key sorts strictly
/// after the mark, in key order, at most `limit` rows. `parts_of` returns
/// parts in id order.
pub trait MessageStore: Send + Sync {
    /// Location reported as the store's session directory
    fn location(&self) -> PathBuf;

    fn sessions(&self) -> Result<Vec<StoredSession>>;

    fn session(&self, session_id: &str) -> Result<Option<StoredSession>> {
        Ok(self.sessions()?.into_iter().find(|s| s.id == session_id))
    }

    fn messages_since(
        &self,
        session_id: &str,
        after: &RowMark,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    fn parts_since(
        &self,
        session_id: &str,
        after: &RowMark,
        limit: usize,
    ) -> Result<Vec<StoredPart>>;

    fn message(&self, session_id: &str, message_id: &str) -> Result<Option<StoredMessage>>;

    fn parts_of(&self, message_id: &str) -> Result<Vec<StoredPart>>;

    /// Keys of the newest message and newest part of a session
    fn latest_updates(&self, session_id: &str) -> Result<(RowMark, RowMark)>;
}
