use anyhow::{Context, Result};
use mindtrace_providers::{DetectorConfig, ProviderKind, ProviderPaths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "MINDTRACE_CONFIG";

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    path.to_path_buf()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<ProviderKind>,
    pub claude_dir: Option<PathBuf>,
    pub codex_dir: Option<PathBuf>,
    pub opencode_dir: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub query_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: None,
            claude_dir: None,
            codex_dir: None,
            opencode_dir: None,
            poll_interval_ms: 1000,
            query_timeout_ms: 2000,
        }
    }
}

impl Config {
    /// `$MINDTRACE_CONFIG`, else `<config_dir>/mindtrace/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(expand_tilde(Path::new(&path)));
        }
        dirs::config_dir().map(|dir| dir.join("mindtrace").join("config.toml"))
    }

    /// A missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn provider_paths(&self) -> ProviderPaths {
        ProviderPaths {
            claude_dir: self.claude_dir.as_deref().map(expand_tilde),
            codex_dir: self.codex_dir.as_deref().map(expand_tilde),
            opencode_dir: self.opencode_dir.as_deref().map(expand_tilde),
        }
    }

    /// Detector inputs; a provider given on the command line beats the file's
    pub fn detector_config(&self, provider_override: Option<ProviderKind>) -> DetectorConfig {
        DetectorConfig {
            provider: provider_override.or(self.provider),
            paths: self.provider_paths(),
            query_timeout: Duration::from_millis(self.query_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_returns_default() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = Config::load_from(&temp_dir.path().join("nonexistent.toml"))?;
        assert_eq!(config, Config::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "provider = \"codex\"\ncodex_dir = \"/data/codex\"\n")?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.provider, Some(ProviderKind::Codex));
        assert_eq!(config.codex_dir, Some(PathBuf::from("/data/codex")));
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.query_timeout_ms, 2000);
        Ok(())
    }

    #[test]
    fn test_invalid_provider_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "provider = \"gemini\"\n")?;
        assert!(Config::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_cli_override_beats_file() {
        let config = Config {
            provider: Some(ProviderKind::Claude),
            query_timeout_ms: 500,
            ..Config::default()
        };
        let detector = config.detector_config(Some(ProviderKind::OpenCode));
        assert_eq!(detector.provider, Some(ProviderKind::OpenCode));
        assert_eq!(detector.query_timeout, Duration::from_millis(500));
        assert_eq!(config.detector_config(None).provider, Some(ProviderKind::Claude));
    }
}
