use mindtrace_types::normalize_path;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// Base directories of the three provider data stores
///
/// `None` fields fall back to the tool's default location under the user's
/// home (Claude, Codex) or data directory (OpenCode).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderPaths {
    pub claude_dir: Option<PathBuf>,
    pub codex_dir: Option<PathBuf>,
    pub opencode_dir: Option<PathBuf>,
}

impl ProviderPaths {
    /// `~/.claude/projects`
    pub fn claude(&self) -> PathBuf {
        self.claude_dir.clone().unwrap_or_else(|| {
            home().join(".claude").join("projects")
        })
    }

    /// `~/.codex` (sessions live in `sessions/`, the index in `state.sqlite`)
    pub fn codex(&self) -> PathBuf {
        self.codex_dir.clone().unwrap_or_else(|| home().join(".codex"))
    }

    /// `<data_dir>/opencode`
    pub fn opencode(&self) -> PathBuf {
        self.opencode_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| home().join(".local").join("share"))
                .join("opencode")
        })
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Memoized path normalization owned by one provider instance
#[derive(Debug, Default)]
pub struct PathCache {
    entries: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&self, path: &Path) -> PathBuf {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .entry(path.to_path_buf())
            .or_insert_with(|| normalize_path(path))
            .clone()
    }

    pub fn same(&self, a: &Path, b: &Path) -> bool {
        self.normalize(a) == self.normalize(b)
    }
}

pub(crate) fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub(crate) fn epoch_millis(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub(crate) fn from_epoch_millis(ms: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(ms.max(0) as u64)
}

/// Newest first; entries without an mtime sort last
pub(crate) fn sort_newest_first<T>(items: &mut [T], key: impl Fn(&T) -> Option<SystemTime>) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win() {
        let paths = ProviderPaths {
            claude_dir: Some(PathBuf::from("/tmp/c")),
            codex_dir: Some(PathBuf::from("/tmp/x")),
            opencode_dir: Some(PathBuf::from("/tmp/o")),
        };
        assert_eq!(paths.claude(), PathBuf::from("/tmp/c"));
        assert_eq!(paths.codex(), PathBuf::from("/tmp/x"));
        assert_eq!(paths.opencode(), PathBuf::from("/tmp/o"));
    }

    #[test]
    fn test_defaults_are_tool_locations() {
        let paths = ProviderPaths::default();
        assert!(paths.claude().ends_with(".claude/projects"));
        assert!(paths.codex().ends_with(".codex"));
        assert!(paths.opencode().ends_with("opencode"));
    }

    #[test]
    fn test_path_cache_same() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PathCache::new();
        let nested = dir.path().join("a").join("..");
        std::fs::create_dir(dir.path().join("a")).unwrap();
        assert!(cache.same(&nested, dir.path()));
    }

    #[test]
    fn test_sort_newest_first() {
        let t = |ms| Some(from_epoch_millis(ms));
        let mut items = vec![t(1), None, t(3), t(2)];
        sort_newest_first(&mut items, |x| *x);
        assert_eq!(items, vec![t(3), t(2), t(1), None]);
    }
}
