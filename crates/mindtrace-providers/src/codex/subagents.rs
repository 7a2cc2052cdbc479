use chrono::{DateTime, Utc};
use std::path::Path;

use super::discovery::{rollout_files, rollout_session};
use super::io::{extract_codex_header, extract_review_spawns};
use super::normalize::CodexNormalizer;
use crate::reader::JsonlTailReader;
use crate::traits::{ForkInfo, SessionReader};

/// Maximum gap between a parent's `entered_review_mode` and the child's start
const MAX_SPAWN_DIFF_MS: i64 = 100;

/// Subagent rollouts spawned by one Codex session
///
/// Children carry `source: {"subagent": ..}` in their `session_meta`. Newer
/// releases also name the parent thread; older review subagents are matched
/// by start time against the parent's review-mode events.
pub fn scan_subagents(sessions_dir: &Path, parent: &Path, parent_id: &str) -> Vec<ForkInfo> {
    let mut spawns: Option<Vec<DateTime<Utc>>> = None;

    let mut forks: Vec<ForkInfo> = rollout_files(sessions_dir)
        .into_iter()
        .filter(|path| path.as_path() != parent)
        .filter_map(|path| {
            let header = extract_codex_header(&path).ok()?;
            let agent_type = header.subagent_type.clone()?;

            let linked = match header.parent_session_id.as_deref() {
                Some(explicit) => explicit == parent_id,
                None => {
                    let started = header.started_at?;
                    let spawns = spawns.get_or_insert_with(|| extract_review_spawns(parent));
                    find_matching_spawn(spawns, started).is_some()
                }
            };
            if !linked {
                return None;
            }

            let session = rollout_session(&path)?;
            let mut reader = JsonlTailReader::new(&path, CodexNormalizer::new(&session.id));
            let events = reader.read_all();
            Some(ForkInfo {
                id: session.id,
                path,
                agent_type: Some(agent_type),
                description: header.label(),
                events,
            })
        })
        .collect();

    forks.sort_by(|a, b| {
        let first = |f: &ForkInfo| f.events.first().map(|e| e.timestamp);
        first(a).cmp(&first(b)).then_with(|| a.id.cmp(&b.id))
    });
    forks
}

fn find_matching_spawn(spawns: &[DateTime<Utc>], started: DateTime<Utc>) -> Option<DateTime<Utc>> {
    spawns
        .iter()
        .copied()
        .filter(|spawn| (started - *spawn).num_milliseconds().abs() <= MAX_SPAWN_DIFF_MS)
        .min_by_key(|spawn| (started - *spawn).num_milliseconds().abs())
}
