//! Isolated environment for provider and CLI integration tests.

use anyhow::Result;
use assert_cmd::Command;
use mindtrace_providers::ProviderPaths;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::fixtures::{ClaudeFixture, CodexFixture, OpenCodeFixture};

/// Temp directory holding one workspace and the three provider data roots
///
/// # Example
/// ```no_run
/// use mindtrace_testing::TestWorld;
///
/// let world = TestWorld::new();
/// let result = world.run(&["sessions"]).unwrap();
/// assert!(result.success());
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
    workspace: PathBuf,
    env_vars: HashMap<String, String>,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let workspace = temp_dir.path().join("project");
        std::fs::create_dir_all(&workspace).expect("Failed to create workspace");
        // canonical form so recorded cwd values compare equal on symlinked temp dirs
        let workspace = workspace.canonicalize().unwrap_or(workspace);

        Self {
            temp_dir,
            workspace,
            env_vars: HashMap::new(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn claude_root(&self) -> PathBuf {
        self.temp_dir.path().join(".claude").join("projects")
    }

    pub fn codex_root(&self) -> PathBuf {
        self.temp_dir.path().join(".codex")
    }

    pub fn opencode_root(&self) -> PathBuf {
        self.temp_dir.path().join("opencode")
    }

    pub fn claude(&self) -> ClaudeFixture {
        ClaudeFixture::new(self.claude_root())
    }

    pub fn codex(&self) -> CodexFixture {
        CodexFixture::new(self.codex_root())
    }

    pub fn opencode(&self) -> OpenCodeFixture {
        OpenCodeFixture::new(self.opencode_root())
    }

    pub fn provider_paths(&self) -> ProviderPaths {
        ProviderPaths {
            claude_dir: Some(self.claude_root()),
            codex_dir: Some(self.codex_root()),
            opencode_dir: Some(self.opencode_root()),
        }
    }

    /// Set an environment variable for CLI execution.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Write `config.toml` pointing every provider at this world, plus `extra` lines
    pub fn write_config(&self, extra: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join("config.toml");
        let body = format!(
            "claude_dir = {:?}\ncodex_dir = {:?}\nopencode_dir = {:?}\n{}\n",
            self.claude_root().to_string_lossy(),
            self.codex_root().to_string_lossy(),
            self.opencode_root().to_string_lossy(),
            extra
        );
        std::fs::write(&path, body)?;
        Ok(path)
    }

    /// Point a CLI command at this world: config file, workspace and env vars
    pub fn configure_command<'a>(&self, cmd: &'a mut Command) -> Result<&'a mut Command> {
        let config = self.temp_dir.path().join("config.toml");
        if !config.exists() {
            self.write_config("")?;
        }
        cmd.env("MINDTRACE_CONFIG", &config)
            .arg("--workspace")
            .arg(&self.workspace)
            .current_dir(self.temp_dir.path());
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        Ok(cmd)
    }

    /// Run the `mindtrace` binary with `args`.
    ///
    /// Requires the binary to be built by cargo for the calling test target.
    #[allow(deprecated)]
    pub fn run(&self, args: &[&str]) -> Result<CliResult> {
        let mut cmd = Command::cargo_bin("mindtrace")
            .map_err(|e| anyhow::anyhow!("Failed to find mindtrace binary: {}", e))?;
        cmd.args(args);
        self.configure_command(&mut cmd)?;

        let output = cmd.output()?;
        Ok(CliResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Result of a CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CliResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Parse stdout as one JSON document.
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }

    /// Parse stdout as JSON lines.
    pub fn json_lines(&self) -> Result<Vec<serde_json::Value>> {
        self.stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Ok(serde_json::from_str(l)?))
            .collect()
    }
}
