use anyhow::{Context, Result, bail};
use mindtrace_providers::{Provider, SessionRef};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// What every handler needs: the chosen provider, the workspace and the config
pub struct HandlerContext {
    pub provider: Box<dyn Provider>,
    pub workspace: PathBuf,
    pub config: Config,
}

impl HandlerContext {
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// The session named by `id`, else the workspace's active session
    pub fn session(&self, id: Option<&str>) -> Result<SessionRef> {
        match id {
            Some(id) => self
                .provider
                .find_all_sessions(&self.workspace)
                .into_iter()
                .find(|s| s.id == id)
                .with_context(|| {
                    format!(
                        "Session {} not found for {} in {}",
                        id,
                        self.provider.kind(),
                        self.workspace.display()
                    )
                }),
            None => match self.provider.find_active_session(&self.workspace) {
                Some(session) => Ok(session),
                None => bail!(
                    "No {} sessions found for {}",
                    self.provider.kind(),
                    self.workspace.display()
                ),
            },
        }
    }
}

/// Write one compact JSON document per line
pub fn print_json_lines<T: Serialize>(items: impl IntoIterator<Item = T>) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for item in items {
        serde_json::to_writer(&mut out, &item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

pub fn rfc3339(time: Option<std::time::SystemTime>) -> Option<String> {
    time.map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
}
