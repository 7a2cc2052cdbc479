pub mod discovery;
pub mod io;
pub mod models;
pub mod normalize;
pub(crate) mod schema;
pub mod subagents;

use std::path::{Path, PathBuf};

pub use self::discovery::encode_project_dir;
pub use self::io::{ClaudeHeader, extract_claude_header};
pub use self::normalize::ClaudeNormalizer;

use crate::paths::{PathCache, ProviderPaths, modified, sort_newest_first};
use crate::reader::JsonlTailReader;
use crate::traits::{
    ForkInfo, Provider, ProviderKind, SessionDirDiscovery, SessionReader, SessionRef,
};

/// Claude Code: one JSONL file per session under `~/.claude/projects/<encoded workspace>/`
pub struct ClaudeProvider {
    base: PathBuf,
    cache: PathCache,
}

impl ClaudeProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            cache: PathCache::new(),
        }
    }

    pub fn from_paths(paths: &ProviderPaths) -> Self {
        Self::new(paths.claude())
    }

    fn session_ref(&self, path: &Path) -> Option<SessionRef> {
        let id = self.session_id_from_path(path)?;
        let workspace = extract_claude_header(path).ok().and_then(|h| h.cwd).map(PathBuf::from);
        Some(SessionRef {
            kind: ProviderKind::Claude,
            id,
            path: path.to_path_buf(),
            modified: modified(path),
            workspace,
        })
    }
}

impl Provider for ClaudeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn base_dir(&self) -> &Path {
        &self.base
    }

    fn encode_workspace_path(&self, workspace: &Path) -> String {
        encode_project_dir(workspace)
    }

    fn discover_session_dir(&self, workspace: &Path) -> SessionDirDiscovery {
        SessionDirDiscovery {
            expected: self.base.join(encode_project_dir(workspace)),
            discovered: discovery::find_project_dir(&self.base, workspace, &self.cache),
        }
    }

    fn sessions_in_dir(&self, dir: &Path) -> Vec<SessionRef> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(
                    dir = %dir.display(),
                    error = %e,
                    "cannot list claude project directory"
                );
                return Vec::new();
            }
        };

        let mut sessions: Vec<SessionRef> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| self.is_session_file(p))
            .filter(|p| std::fs::metadata(p).is_ok_and(|m| m.len() > 0))
            .filter_map(|p| self.session_ref(&p))
            .collect();
        sort_newest_first(&mut sessions, |s| s.modified);
        sessions
    }

    fn find_all_sessions(&self, workspace: &Path) -> Vec<SessionRef> {
        match self.discover_session_dir(workspace).discovered {
            Some(dir) => self.sessions_in_dir(&dir),
            None => Vec::new(),
        }
    }

    /// `<uuid>.jsonl`; sidechain `agent-*.jsonl` files are not sessions
    fn is_session_file(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "jsonl")
            && path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| uuid::Uuid::parse_str(stem).is_ok())
    }

    fn session_id_from_path(&self, path: &Path) -> Option<String> {
        if self.is_session_file(path) {
            return path.file_stem().and_then(|s| s.to_str()).map(str::to_string);
        }
        extract_claude_header(path).ok().and_then(|h| h.session_id)
    }

    fn session_label(&self, session: &SessionRef) -> Option<String> {
        extract_claude_header(&session.path).ok().and_then(|h| h.label())
    }

    fn create_reader(&self, session: &SessionRef) -> Box<dyn SessionReader> {
        Box::new(JsonlTailReader::new(&session.path, ClaudeNormalizer::new(&session.id)))
    }

    fn scan_subagents(&self, session: &SessionRef) -> Vec<ForkInfo> {
        subagents::scan_subagents(&session.path, &session.id)
    }

    fn context_window(&self, model: &str) -> Option<u64> {
        models::context_window(model)
    }
}
