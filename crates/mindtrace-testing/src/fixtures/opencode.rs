use anyhow::Result;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use super::set_mtime_ms;

#[derive(Debug, Clone)]
pub struct OpenCodeMessage {
    pub id: String,
    /// Message `data` without its id
    pub info: Value,
    pub updated_ms: i64,
    /// `(part id, part data without id, updated ms)`
    pub parts: Vec<(String, Value, i64)>,
}

impl OpenCodeMessage {
    pub fn new(id: &str, info: Value, updated_ms: i64) -> Self {
        Self {
            id: id.to_string(),
            info,
            updated_ms,
            parts: Vec::new(),
        }
    }

    pub fn user(id: &str, created_ms: i64) -> Self {
        Self::new(id, json!({"role": "user", "time": {"created": created_ms}}), created_ms)
    }

    pub fn assistant(id: &str, parent: &str, created_ms: i64) -> Self {
        Self::new(
            id,
            json!({
                "role": "assistant",
                "parentID": parent,
                "modelID": "claude-sonnet-4-5",
                "providerID": "anthropic",
                "time": {"created": created_ms, "completed": created_ms + 1000},
                "tokens": {
                    "input": 12,
                    "output": 30,
                    "reasoning": 0,
                    "cache": {"read": 400, "write": 20}
                }
            }),
            created_ms,
        )
    }

    pub fn part(mut self, id: &str, data: Value, updated_ms: i64) -> Self {
        self.parts.push((id.to_string(), data, updated_ms));
        self
    }
}

#[derive(Debug, Clone)]
pub struct OpenCodeSession {
    pub id: String,
    pub project_id: String,
    pub directory: PathBuf,
    pub parent_id: Option<String>,
    pub title: Option<String>,
    pub updated_ms: i64,
    pub messages: Vec<OpenCodeMessage>,
}

impl OpenCodeSession {
    pub fn new(id: &str, directory: &Path, updated_ms: i64) -> Self {
        Self {
            id: id.to_string(),
            project_id: "prj_test".to_string(),
            directory: directory.to_path_buf(),
            parent_id: None,
            title: None,
            updated_ms,
            messages: Vec::new(),
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn child_of(mut self, parent: &str) -> Self {
        self.parent_id = Some(parent.to_string());
        self
    }

    pub fn message(mut self, message: OpenCodeMessage) -> Self {
        self.messages.push(message);
        self
    }
}

/// OpenCode data directory rooted in a temp dir
pub struct OpenCodeFixture {
    root: PathBuf,
}

impl OpenCodeFixture {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-record JSON files under `storage/`, mtimes set to the update times
    pub fn write_files(&self, session: &OpenCodeSession) -> Result<()> {
        let storage = self.root.join("storage");

        let session_dir = storage.join("session").join(&session.project_id);
        std::fs::create_dir_all(&session_dir)?;
        let mut info = json!({
            "id": session.id,
            "projectID": session.project_id,
            "directory": session.directory,
            "time": {"created": session.updated_ms, "updated": session.updated_ms}
        });
        if let Some(parent) = &session.parent_id {
            info["parentID"] = json!(parent);
        }
        if let Some(title) = &session.title {
            info["title"] = json!(title);
        }
        let session_path = session_dir.join(format!("{}.json", session.id));
        std::fs::write(&session_path, info.to_string())?;
        set_mtime_ms(&session_path, session.updated_ms)?;

        for message in &session.messages {
            let message_dir = storage.join("message").join(&session.id);
            std::fs::create_dir_all(&message_dir)?;
            let mut data = message.info.clone();
            data["id"] = json!(message.id);
            data["sessionID"] = json!(session.id);
            let path = message_dir.join(format!("{}.json", message.id));
            std::fs::write(&path, data.to_string())?;
            set_mtime_ms(&path, message.updated_ms)?;

            let part_dir = storage.join("part").join(&message.id);
            std::fs::create_dir_all(&part_dir)?;
            for (id, part, updated) in &message.parts {
                let mut data = part.clone();
                data["id"] = json!(id);
                data["messageID"] = json!(message.id);
                data["sessionID"] = json!(session.id);
                let path = part_dir.join(format!("{}.json", id));
                std::fs::write(&path, data.to_string())?;
                set_mtime_ms(&path, *updated)?;
            }
        }
        Ok(())
    }

    /// `opencode.db` holding the given sessions
    pub fn write_db(&self, sessions: &[OpenCodeSession]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.root.join("opencode.db");
        let conn = rusqlite::Connection::open(&path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS project (
                id TEXT PRIMARY KEY, worktree TEXT,
                time_created INTEGER, time_updated INTEGER, data TEXT);
             CREATE TABLE IF NOT EXISTS session (
                id TEXT PRIMARY KEY, project_id TEXT REFERENCES project(id), parent_id TEXT,
                directory TEXT, title TEXT, time_created INTEGER, time_updated INTEGER, data TEXT);
             CREATE TABLE IF NOT EXISTS message (
                id TEXT PRIMARY KEY, session_id TEXT REFERENCES session(id),
                time_created INTEGER, time_updated INTEGER, data TEXT);
             CREATE TABLE IF NOT EXISTS part (
                id TEXT PRIMARY KEY, message_id TEXT REFERENCES message(id), session_id TEXT,
                time_created INTEGER, time_updated INTEGER, data TEXT);",
        )?;

        for session in sessions {
            conn.execute(
                "INSERT OR REPLACE INTO project (id, worktree, time_created, time_updated, data)
                 VALUES (?1, ?2, 0, 0, '{}')",
                rusqlite::params![session.project_id, session.directory.to_string_lossy()],
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO session
                 (id, project_id, parent_id, directory, title, time_created, time_updated, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, '{}')",
                rusqlite::params![
                    session.id,
                    session.project_id,
                    session.parent_id,
                    session.directory.to_string_lossy(),
                    session.title,
                    session.updated_ms
                ],
            )?;
            for message in &session.messages {
                conn.execute(
                    "INSERT OR REPLACE INTO message
                     (id, session_id, time_created, time_updated, data)
                     VALUES (?1, ?2, ?3, ?3, ?4)",
                    rusqlite::params![
                        message.id,
                        session.id,
                        message.updated_ms,
                        message.info.to_string()
                    ],
                )?;
                for (id, part, updated) in &message.parts {
                    conn.execute(
                        "INSERT OR REPLACE INTO part
                         (id, message_id, session_id, time_created, time_updated, data)
                         VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
                        rusqlite::params![id, message.id, session.id, updated, part.to_string()],
                    )?;
                }
            }
        }
        Ok(path)
    }
}
