use std::path::{Path, PathBuf};

use super::io::extract_claude_header;
use crate::paths::PathCache;

/// Claude Code's project directory name for a workspace
///
/// Every character that is not ASCII alphanumeric becomes `-`, so
/// `/home/me/my.app` maps to `-home-me-my-app`.
pub fn encode_project_dir(workspace: &Path) -> String {
    workspace
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Locate the project directory holding a workspace's sessions
///
/// Tries the encoded name, then any project whose session headers report the
/// workspace as `cwd` (encodings drift between releases), then a
/// case-insensitive name match.
pub fn find_project_dir(base: &Path, workspace: &Path, cache: &PathCache) -> Option<PathBuf> {
    let encoded = encode_project_dir(workspace);
    let expected = base.join(&encoded);
    if expected.is_dir() {
        return Some(expected);
    }

    let project_dirs: Vec<PathBuf> = match std::fs::read_dir(base) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(e) => {
            tracing::debug!(
                base = %base.display(),
                error = %e,
                "claude projects directory unavailable"
            );
            return None;
        }
    };

    for dir in &project_dirs {
        if project_cwd(dir).is_some_and(|cwd| cache.same(Path::new(&cwd), workspace)) {
            return Some(dir.clone());
        }
    }

    project_dirs.into_iter().find(|dir| {
        dir.file_name()
            .map(|n| n.to_string_lossy().eq_ignore_ascii_case(&encoded))
            .unwrap_or(false)
    })
}

/// `cwd` reported by the first session file in a project directory that has one
fn project_cwd(dir: &Path) -> Option<String> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
        .find_map(|p| extract_claude_header(&p).ok().and_then(|h| h.cwd))
}
