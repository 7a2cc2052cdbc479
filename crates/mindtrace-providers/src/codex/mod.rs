pub mod discovery;
pub mod index;
pub mod io;
pub mod models;
pub mod normalize;
pub(crate) mod schema;
pub mod subagents;
pub mod tools;

use mindtrace_types::TokenUsage;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use self::index::ThreadIndex;
pub use self::io::{CodexHeader, extract_codex_header, session_id_from_filename};
pub use self::normalize::CodexNormalizer;

use self::discovery::{
    SESSIONS_DIR, is_rollout_file, rollout_files, rollout_session, scan_workspace_sessions,
};
use crate::paths::{PathCache, ProviderPaths, sort_newest_first};
use crate::reader::JsonlTailReader;
use crate::rows::DEFAULT_QUERY_TIMEOUT;
use crate::traits::{
    ForkInfo, Provider, ProviderKind, SessionDirDiscovery, SessionReader, SessionRef,
};

/// Codex CLI: date-partitioned rollout files under `~/.codex/sessions`,
/// optionally indexed by `~/.codex/state.sqlite`
pub struct CodexProvider {
    base: PathBuf,
    query_timeout: Duration,
    cache: PathCache,
}

impl CodexProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            cache: PathCache::new(),
        }
    }

    pub fn from_paths(paths: &ProviderPaths) -> Self {
        Self::new(paths.codex())
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.base.join(SESSIONS_DIR)
    }

    fn indexed_sessions(&self, workspace: &Path) -> Option<Vec<SessionRef>> {
        let Some(index) = ThreadIndex::open(&self.base, self.query_timeout) else {
            tracing::debug!(
                base = %self.base.display(),
                "no codex thread index, scanning rollouts"
            );
            return None;
        };
        match index.sessions_for(workspace, &self.cache.normalize(workspace)) {
            Ok(sessions) if !sessions.is_empty() => Some(sessions),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "codex thread index unavailable, scanning rollouts");
                None
            }
        }
    }
}

impl Provider for CodexProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Codex
    }

    fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Rollouts are not partitioned by workspace; the key is the normalized cwd
    fn encode_workspace_path(&self, workspace: &Path) -> String {
        self.cache.normalize(workspace).to_string_lossy().into_owned()
    }

    fn discover_session_dir(&self, workspace: &Path) -> SessionDirDiscovery {
        let expected = self.sessions_dir();
        let discovered = (!self.find_all_sessions(workspace).is_empty()).then(|| expected.clone());
        SessionDirDiscovery { expected, discovered }
    }

    fn sessions_in_dir(&self, dir: &Path) -> Vec<SessionRef> {
        let mut sessions: Vec<SessionRef> = rollout_files(dir)
            .iter()
            .filter(|p| std::fs::metadata(p).is_ok_and(|m| m.len() > 0))
            .filter_map(|p| rollout_session(p))
            .collect();
        sort_newest_first(&mut sessions, |s| s.modified);
        sessions
    }

    fn find_all_sessions(&self, workspace: &Path) -> Vec<SessionRef> {
        self.indexed_sessions(workspace).unwrap_or_else(|| {
            scan_workspace_sessions(&self.sessions_dir(), workspace, &self.cache)
        })
    }

    fn is_session_file(&self, path: &Path) -> bool {
        is_rollout_file(path)
    }

    fn session_id_from_path(&self, path: &Path) -> Option<String> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(session_id_from_filename)
            .or_else(|| extract_codex_header(path).ok().and_then(|h| h.session_id))
    }

    fn session_label(&self, session: &SessionRef) -> Option<String> {
        extract_codex_header(&session.path).ok().and_then(|h| h.label())
    }

    fn create_reader(&self, session: &SessionRef) -> Box<dyn SessionReader> {
        Box::new(JsonlTailReader::new(&session.path, CodexNormalizer::new(&session.id)))
    }

    fn scan_subagents(&self, session: &SessionRef) -> Vec<ForkInfo> {
        subagents::scan_subagents(&self.sessions_dir(), &session.path, &session.id)
    }

    fn context_window(&self, model: &str) -> Option<u64> {
        models::context_window(model)
    }

    /// Codex `input_tokens` already counts cached input
    fn context_size(&self, usage: &TokenUsage) -> u64 {
        usage.input_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_size_is_input_only() {
        let provider = CodexProvider::new("/nonexistent");
        let usage = TokenUsage {
            input_tokens: 1000,
            cache_read_input_tokens: 800,
            ..Default::default()
        };
        assert_eq!(provider.context_size(&usage), 1000);
    }

    #[test]
    fn test_missing_store_finds_nothing() {
        let provider = CodexProvider::new("/nonexistent/codex");
        let discovery = provider.discover_session_dir(Path::new("/w"));
        assert_eq!(discovery.expected, PathBuf::from("/nonexistent/codex/sessions"));
        assert!(discovery.discovered.is_none());
        assert!(provider.find_active_session(Path::new("/w")).is_none());
    }
}
