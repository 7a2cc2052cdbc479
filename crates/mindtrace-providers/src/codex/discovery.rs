use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::io::{CodexHeader, extract_codex_header, session_id_from_filename};
use crate::paths::{PathCache, modified, sort_newest_first};
use crate::traits::{ProviderKind, SessionRef};

pub const SESSIONS_DIR: &str = "sessions";

/// `sessions/YYYY/MM/DD/rollout-*.jsonl`
const MAX_DEPTH: usize = 4;

pub fn is_rollout_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "jsonl")
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("rollout-"))
}

/// Every rollout file under `dir`, in path order
pub fn rollout_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(MAX_DEPTH)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(
                    dir = %dir.display(),
                    error = %e,
                    "skipping unreadable codex entry"
                );
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_rollout_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// `SessionRef` for one rollout, `None` when neither the filename nor the
/// header yields an id
pub fn rollout_session(path: &Path) -> Option<SessionRef> {
    rollout_entry(path).map(|(session, _)| session)
}

fn rollout_entry(path: &Path) -> Option<(SessionRef, CodexHeader)> {
    let header = extract_codex_header(path).unwrap_or_default();
    let id = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(session_id_from_filename)
        .or_else(|| header.session_id.clone())?;
    let session = SessionRef {
        kind: ProviderKind::Codex,
        id,
        path: path.to_path_buf(),
        modified: modified(path),
        workspace: header.cwd.clone().map(PathBuf::from),
    };
    Some((session, header))
}

/// File-scan strategy: top-level rollouts whose recorded cwd is the workspace
///
/// Subagent rollouts share the parent's cwd; they are reported as forks instead.
pub fn scan_workspace_sessions(
    sessions_dir: &Path,
    workspace: &Path,
    cache: &PathCache,
) -> Vec<SessionRef> {
    let mut sessions: Vec<SessionRef> = rollout_files(sessions_dir)
        .iter()
        .filter_map(|path| rollout_entry(path))
        .filter(|(_, header)| header.subagent_type.is_none())
        .map(|(session, _)| session)
        .filter(|s| s.workspace.as_deref().is_some_and(|cwd| cache.same(cwd, workspace)))
        .collect();
    sort_newest_first(&mut sessions, |s| s.modified);
    sessions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_rollout(dir: &Path, name: &str, cwd: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        let meta = serde_json::json!({
            "timestamp": "2025-06-01T10:00:00Z",
            "type": "session_meta",
            "payload": {"id": "meta-id", "cwd": cwd}
        });
        std::fs::write(&path, format!("{}\n", meta)).unwrap();
        path
    }

    #[test]
    fn test_scan_matches_cwd() {
        let root = tempfile::tempdir().unwrap();
        let workspace = root.path().join("proj");
        std::fs::create_dir(&workspace).unwrap();
        let day = root.path().join("sessions/2025/06/01");
        write_rollout(
            &day,
            "rollout-2025-06-01T10-00-00-0197a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b.jsonl",
            &workspace.to_string_lossy(),
        );
        write_rollout(&day, "rollout-2025-06-01T11-00-00-x.jsonl", "/elsewhere");
        std::fs::write(day.join("notes.jsonl"), "").unwrap();

        let sessions =
            scan_workspace_sessions(&root.path().join("sessions"), &workspace, &PathCache::new());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "0197a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b");
    }

    #[test]
    fn test_id_falls_back_to_meta() {
        let root = tempfile::tempdir().unwrap();
        let path = write_rollout(root.path(), "rollout-custom.jsonl", "/w");
        assert_eq!(rollout_session(&path).unwrap().id, "meta-id");
    }

    #[test]
    fn test_missing_dir_is_empty() {
        assert!(rollout_files(Path::new("/nonexistent/codex/sessions")).is_empty());
    }
}
