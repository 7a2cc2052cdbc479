use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::reader::OpenCodeReader;
use super::schema::PartKind;
use super::store::MessageStore;
use crate::Result;
use crate::reader::RowMark;
use crate::traits::{ForkInfo, SessionReader};

#[derive(Debug, Default, Clone)]
struct TaskCall {
    agent_type: Option<String>,
    description: Option<String>,
}

/// Child sessions spawned through the parent's `task` tool
pub fn scan_subagents(store: &Arc<dyn MessageStore>, parent_id: &str) -> Vec<ForkInfo> {
    match try_scan(store, parent_id) {
        Ok(forks) => forks,
        Err(e) => {
            tracing::debug!(session = %parent_id, error = %e, "cannot scan opencode subagents");
            Vec::new()
        }
    }
}

fn try_scan(store: &Arc<dyn MessageStore>, parent_id: &str) -> Result<Vec<ForkInfo>> {
    let children: Vec<_> = store
        .sessions()?
        .into_iter()
        .filter(|s| s.parent_id.as_deref() == Some(parent_id))
        .collect();
    if children.is_empty() {
        return Ok(Vec::new());
    }

    let calls = task_calls(store.as_ref(), parent_id)?;
    let mut forks: Vec<ForkInfo> = children
        .into_iter()
        .map(|child| {
            let call = calls.get(&child.id).cloned().unwrap_or_default();
            let events = OpenCodeReader::new(Arc::clone(store), child.id.clone()).read_all();
            ForkInfo {
                description: call.description.or(child.title),
                agent_type: call.agent_type,
                id: child.id,
                path: child.path,
                events,
            }
        })
        .collect();

    forks.sort_by(|a, b| {
        let first = |f: &ForkInfo| f.events.first().map(|e| e.timestamp);
        first(a).cmp(&first(b)).then_with(|| a.id.cmp(&b.id))
    });
    Ok(forks)
}

/// Child session id -> the `task` call that spawned it
fn task_calls(store: &dyn MessageStore, parent_id: &str) -> Result<HashMap<String, TaskCall>> {
    let mut calls = HashMap::new();
    let everything = RowMark::new(i64::MIN, "");
    for message in store.messages_since(parent_id, &everything, usize::MAX)? {
        for stored in store.parts_of(&message.info.id)? {
            let PartKind::Tool { tool, state, .. } = stored.part.kind else {
                continue;
            };
            if tool != "task" {
                continue;
            }
            let child = ["sessionId", "sessionID", "session_id"]
                .iter()
                .find_map(|key| state.metadata.get(key).and_then(Value::as_str));
            if let Some(child) = child {
                let field = |key: &str| {
                    state.input.get(key).and_then(Value::as_str).map(str::to_string)
                };
                calls.insert(
                    child.to_string(),
                    TaskCall {
                        agent_type: field("subagent_type").or_else(|| field("subagentType")),
                        description: field("description"),
                    },
                );
            }
        }
    }
    Ok(calls)
}
