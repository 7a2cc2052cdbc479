use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::claude::ClaudeProvider;
use crate::codex::CodexProvider;
use crate::opencode::OpenCodeProvider;
use crate::paths::ProviderPaths;
use crate::rows::DEFAULT_QUERY_TIMEOUT;
use crate::traits::{Provider, ProviderKind};

/// Inputs to provider selection
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Forces a provider regardless of activity
    pub provider: Option<ProviderKind>,
    pub paths: ProviderPaths,
    /// Bound on queries against the Codex index and the OpenCode database
    pub query_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            provider: None,
            paths: ProviderPaths::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Picks the one provider a process works with
pub struct Detector {
    config: DetectorConfig,
}

impl Detector {
    pub const DEFAULT: ProviderKind = ProviderKind::Claude;

    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn create(&self, kind: ProviderKind) -> Box<dyn Provider> {
        let paths = &self.config.paths;
        match kind {
            ProviderKind::Claude => Box::new(ClaudeProvider::from_paths(paths)),
            ProviderKind::Codex => Box::new(
                CodexProvider::from_paths(paths).with_query_timeout(self.config.query_timeout),
            ),
            ProviderKind::OpenCode => Box::new(OpenCodeProvider::with_query_timeout(
                paths.opencode(),
                self.config.query_timeout,
            )),
        }
    }

    /// Override, else the provider with the most recent activity for the
    /// workspace, else Claude
    pub fn detect_kind(&self, workspace: &Path) -> ProviderKind {
        if let Some(kind) = self.config.provider {
            tracing::debug!(provider = %kind, "provider forced by configuration");
            return kind;
        }

        let mut newest: Option<(ProviderKind, SystemTime)> = None;
        for kind in ProviderKind::ALL {
            let Some(activity) = self.create(kind).latest_activity(workspace) else {
                continue;
            };
            tracing::debug!(provider = %kind, ?activity, "provider activity");
            if newest.is_none_or(|(_, best)| activity > best) {
                newest = Some((kind, activity));
            }
        }

        newest.map(|(kind, _)| kind).unwrap_or_else(|| {
            tracing::debug!(
                workspace = %workspace.display(),
                "no provider activity, using default"
            );
            Self::DEFAULT
        })
    }

    pub fn detect(&self, workspace: &Path) -> Box<dyn Provider> {
        self.create(self.detect_kind(workspace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config(root: &Path) -> DetectorConfig {
        DetectorConfig {
            provider: None,
            paths: ProviderPaths {
                claude_dir: Some(root.join("claude")),
                codex_dir: Some(root.join("codex")),
                opencode_dir: Some(root.join("opencode")),
            },
            query_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_no_activity_defaults_to_claude() {
        let dir = tempfile::tempdir().unwrap();
        let detector = Detector::new(empty_config(dir.path()));
        assert_eq!(detector.detect_kind(Path::new("/w")), ProviderKind::Claude);
    }

    #[test]
    fn test_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = empty_config(dir.path());
        config.provider = Some(ProviderKind::OpenCode);
        let detector = Detector::new(config);
        assert_eq!(detector.detect(Path::new("/w")).kind(), ProviderKind::OpenCode);
    }
}
