pub mod db;
pub mod files;
pub(crate) mod fold;
pub mod models;
pub mod reader;
pub mod schema;
pub mod store;
pub mod subagents;
pub mod tools;

use mindtrace_types::{single_line, truncate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use self::db::SqliteStore;
pub use self::files::FileStore;
pub use self::reader::OpenCodeReader;
pub use self::store::{MessageStore, StoredMessage, StoredPart, StoredSession};

use crate::claude::io::LABEL_MAX_CHARS;
use crate::paths::{PathCache, ProviderPaths, from_epoch_millis};
use crate::rows::DEFAULT_QUERY_TIMEOUT;
use crate::traits::{
    ForkInfo, Provider, ProviderKind, SessionDirDiscovery, SessionReader, SessionRef,
};

/// OpenCode: `opencode.db` when present, else the per-record `storage/` tree
pub struct OpenCodeProvider {
    base: PathBuf,
    store: Arc<dyn MessageStore>,
    cache: PathCache,
}

impl OpenCodeProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self::with_query_timeout(base, DEFAULT_QUERY_TIMEOUT)
    }

    pub fn with_query_timeout(base: impl Into<PathBuf>, timeout: Duration) -> Self {
        let base = base.into();
        let store: Arc<dyn MessageStore> = match SqliteStore::open(&base, timeout) {
            Some(db) => Arc::new(db),
            None => {
                tracing::debug!(base = %base.display(), "no opencode database, using file storage");
                Arc::new(FileStore::new(&base))
            }
        };
        Self::with_store(base, store)
    }

    pub fn with_store(base: impl Into<PathBuf>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            base: base.into(),
            store,
            cache: PathCache::new(),
        }
    }

    pub fn from_paths(paths: &ProviderPaths) -> Self {
        Self::new(paths.opencode())
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    fn stored_sessions(&self) -> Vec<StoredSession> {
        match self.store.sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::debug!(
                    base = %self.base.display(),
                    error = %e,
                    "cannot list opencode sessions"
                );
                Vec::new()
            }
        }
    }

    fn session_ref(session: StoredSession) -> SessionRef {
        SessionRef {
            kind: ProviderKind::OpenCode,
            modified: Some(from_epoch_millis(session.updated_ms)),
            workspace: session.directory.map(PathBuf::from),
            id: session.id,
            path: session.path,
        }
    }
}

impl Provider for OpenCodeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenCode
    }

    fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Sessions record their directory verbatim; the key is the normalized path
    fn encode_workspace_path(&self, workspace: &Path) -> String {
        self.cache.normalize(workspace).to_string_lossy().into_owned()
    }

    fn discover_session_dir(&self, workspace: &Path) -> SessionDirDiscovery {
        let expected = self.store.location();
        let discovered = self.find_active_session(workspace).map(|session| {
            if session.path.extension().is_some_and(|ext| ext == "json") {
                session.path.parent().map(Path::to_path_buf).unwrap_or_else(|| expected.clone())
            } else {
                expected.clone()
            }
        });
        SessionDirDiscovery { expected, discovered }
    }

    fn sessions_in_dir(&self, dir: &Path) -> Vec<SessionRef> {
        self.stored_sessions()
            .into_iter()
            .filter(|s| s.path.starts_with(dir))
            .map(Self::session_ref)
            .collect()
    }

    /// Top-level sessions whose directory is the workspace; child sessions are forks
    fn find_all_sessions(&self, workspace: &Path) -> Vec<SessionRef> {
        self.stored_sessions()
            .into_iter()
            .filter(|s| s.parent_id.is_none())
            .filter(|s| {
                s.directory
                    .as_deref()
                    .is_some_and(|dir| self.cache.same(Path::new(dir), workspace))
            })
            .map(Self::session_ref)
            .collect()
    }

    fn is_session_file(&self, path: &Path) -> bool {
        if path.file_name().is_some_and(|n| n == db::DB_FILE) {
            return true;
        }
        path.extension().is_some_and(|ext| ext == "json")
            && path
                .parent()
                .and_then(Path::parent)
                .and_then(|p| p.file_name())
                .is_some_and(|n| n == "session")
    }

    fn session_id_from_path(&self, path: &Path) -> Option<String> {
        if path.extension().is_some_and(|ext| ext == "json") {
            return path.file_stem().and_then(|s| s.to_str()).map(str::to_string);
        }
        None
    }

    fn session_label(&self, session: &SessionRef) -> Option<String> {
        let title = self.store.session(&session.id).ok().flatten()?.title?;
        let label = truncate(&single_line(&title), LABEL_MAX_CHARS);
        (!label.is_empty()).then_some(label)
    }

    fn create_reader(&self, session: &SessionRef) -> Box<dyn SessionReader> {
        Box::new(OpenCodeReader::new(Arc::clone(&self.store), session.id.clone()))
    }

    fn scan_subagents(&self, session: &SessionRef) -> Vec<ForkInfo> {
        subagents::scan_subagents(&self.store, &session.id)
    }

    fn context_window(&self, model: &str) -> Option<u64> {
        models::context_window(model)
    }
}
