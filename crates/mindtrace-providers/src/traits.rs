use chrono::{DateTime, Utc};
use mindtrace_types::{CanonicalEvent, Role, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use crate::reader::ReaderCursor;
use crate::{Error, Result};

/// The three supported session sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "codex")]
    Codex,
    #[serde(rename = "opencode")]
    OpenCode,
}

impl ProviderKind {
    /// Tie-break order for detection, most preferred first
    pub const ALL: [ProviderKind; 3] =
        [ProviderKind::Claude, ProviderKind::Codex, ProviderKind::OpenCode];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::Codex => "codex",
            ProviderKind::OpenCode => "opencode",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "claude_code" | "claude-code" => Ok(ProviderKind::Claude),
            "codex" => Ok(ProviderKind::Codex),
            "opencode" | "open_code" | "open-code" => Ok(ProviderKind::OpenCode),
            other => Err(Error::Provider(format!("Unknown provider: {}", other))),
        }
    }
}

/// Handle to one session, as returned by enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRef {
    pub kind: ProviderKind,
    pub id: String,
    /// Session file (Claude, Codex) or the store root holding the session (OpenCode)
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub workspace: Option<PathBuf>,
}

/// Where a workspace's sessions are expected to live vs. where they were found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDirDiscovery {
    pub expected: PathBuf,
    pub discovered: Option<PathBuf>,
}

/// A nested child stream (subagent / fork) of a session
#[derive(Debug, Clone)]
pub struct ForkInfo {
    pub id: String,
    pub path: PathBuf,
    pub agent_type: Option<String>,
    pub description: Option<String>,
    pub events: Vec<CanonicalEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub snippet: String,
}

/// Stateful converter from one provider-native JSONL record to canonical events
///
/// A record that cannot be parsed returns `Err`; the reader logs and skips it.
pub trait RecordNormalizer: Send {
    fn normalize_line(&mut self, line: &str) -> Result<Vec<CanonicalEvent>>;

    /// Drop all pairing / context state (called on truncation and explicit reset)
    fn reset(&mut self);

    /// Context-window ceiling last reported by the source, if any
    fn reported_context_window(&self) -> Option<u64> {
        None
    }

    /// Rate-limit snapshot last reported by the source, if any
    fn rate_limits(&self) -> Option<Value> {
        None
    }
}

/// Incremental, resumable reader over one session
///
/// None of these operations fail: a missing source yields nothing, malformed
/// records are logged and skipped.
pub trait SessionReader: Send {
    /// Events derived from data not returned by any previous call
    fn read_new(&mut self) -> Vec<CanonicalEvent>;

    /// Reset, then read everything currently available
    fn read_all(&mut self) -> Vec<CanonicalEvent> {
        self.reset();
        self.read_new()
    }

    /// Forget the cursor and all normalizer state
    fn reset(&mut self);

    /// Re-attempt buffered trailing data (shutdown path)
    fn flush(&mut self) -> Vec<CanonicalEvent> {
        self.read_new()
    }

    /// Whether the most recent `read_new` found the source shrunk and reset
    fn was_truncated(&self) -> bool {
        false
    }

    fn exists(&self) -> bool;

    fn cursor(&self) -> ReaderCursor;

    fn reported_context_window(&self) -> Option<u64> {
        None
    }

    fn rate_limits(&self) -> Option<Value> {
        None
    }
}

/// One session source (Claude Code, Codex, OpenCode)
///
/// Discovery and enumeration degrade to "not found" on any filesystem or
/// database error.
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Root of this provider's data store
    fn base_dir(&self) -> &Path;

    /// Provider-specific encoding of a workspace path (directory name, lookup key)
    fn encode_workspace_path(&self, workspace: &Path) -> String;

    fn discover_session_dir(&self, workspace: &Path) -> SessionDirDiscovery;

    /// Sessions stored under one directory, newest first
    fn sessions_in_dir(&self, dir: &Path) -> Vec<SessionRef>;

    /// Sessions belonging to a workspace, newest first
    fn find_all_sessions(&self, workspace: &Path) -> Vec<SessionRef>;

    /// The most recently active session of a workspace
    fn find_active_session(&self, workspace: &Path) -> Option<SessionRef> {
        self.find_all_sessions(workspace).into_iter().next()
    }

    fn is_session_file(&self, path: &Path) -> bool;

    fn session_id_from_path(&self, path: &Path) -> Option<String>;

    /// Human-readable session label (title, summary or first prompt)
    fn session_label(&self, session: &SessionRef) -> Option<String>;

    fn create_reader(&self, session: &SessionRef) -> Box<dyn SessionReader>;

    fn scan_subagents(&self, session: &SessionRef) -> Vec<ForkInfo>;

    fn search_session(&self, session: &SessionRef, query: &str, limit: usize) -> Vec<SearchHit> {
        let mut reader = self.create_reader(session);
        crate::search::search_events(&reader.read_all(), query, limit)
    }

    /// Most recent activity time for the workspace (detector input)
    fn latest_activity(&self, workspace: &Path) -> Option<SystemTime> {
        self.find_active_session(workspace).and_then(|s| s.modified)
    }

    /// Context window size for a model, if known
    fn context_window(&self, model: &str) -> Option<u64>;

    /// Tokens occupying the context window for a usage snapshot
    ///
    /// Default: input excludes cache traffic, so cache reads and writes are added.
    fn context_size(&self, usage: &TokenUsage) -> u64 {
        usage.input_tokens + usage.cache_read_input_tokens + usage.cache_creation_input_tokens
    }
}
