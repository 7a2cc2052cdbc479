use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::io::extract_claude_header;
use super::normalize::ClaudeNormalizer;
use super::schema::{AssistantContent, ClaudeRecord, UserContent};
use crate::reader::JsonlTailReader;
use crate::traits::{ForkInfo, SessionReader};

const AGENT_PREFIX: &str = "agent-";

#[derive(Debug, Clone, Default)]
struct TaskCall {
    agent_type: Option<String>,
    description: Option<String>,
    prompt: Option<String>,
}

/// Task calls in the parent stream, and which agent each one spawned
#[derive(Debug, Default)]
struct TaskIndex {
    calls: HashMap<String, TaskCall>,
    agent_to_call: HashMap<String, String>,
}

impl TaskIndex {
    fn scan(parent: &Path) -> Self {
        let mut index = TaskIndex::default();
        let Ok(file) = std::fs::File::open(parent) else {
            return index;
        };

        for line in BufReader::new(file).lines().map_while(|l| l.ok()) {
            match serde_json::from_str::<ClaudeRecord>(&line) {
                Ok(ClaudeRecord::Assistant(record)) => {
                    for block in record.message.content {
                        if let AssistantContent::ToolUse { id, name, input } = block
                            && name == "Task"
                        {
                            index.calls.insert(
                                id,
                                TaskCall {
                                    agent_type: str_field(&input, "subagent_type"),
                                    description: str_field(&input, "description"),
                                    prompt: str_field(&input, "prompt"),
                                },
                            );
                        }
                    }
                }
                Ok(ClaudeRecord::User(record)) => {
                    let Some(agent_id) = record.result_agent_id().map(str::to_string) else {
                        continue;
                    };
                    let call_id = record.message.content.iter().find_map(|c| match c {
                        UserContent::ToolResult { tool_use_id, .. } => Some(tool_use_id.clone()),
                        _ => None,
                    });
                    if let Some(call_id) = call_id {
                        index.agent_to_call.insert(agent_id, call_id);
                    }
                }
                _ => {}
            }
        }
        index
    }

    fn attribute(&self, agent_id: &str, first_prompt: Option<&str>) -> TaskCall {
        if let Some(call) = self.agent_to_call.get(agent_id).and_then(|id| self.calls.get(id)) {
            return call.clone();
        }
        // Older logs carry no agentId; the sidechain starts with the Task prompt
        first_prompt
            .and_then(|prompt| {
                self.calls
                    .values()
                    .find(|c| c.prompt.as_deref().map(str::trim) == Some(prompt.trim()))
            })
            .cloned()
            .unwrap_or_default()
    }
}

fn str_field(input: &Value, key: &str) -> Option<String> {
    input.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Subagent streams of one Claude session
///
/// Current layout: `<project>/<session>/subagents/agent-<id>.jsonl`. Older
/// releases wrote `<project>/agent-<id>.jsonl` next to the parent, linked only
/// through the `sessionId` inside.
pub fn scan_subagents(parent: &Path, session_id: &str) -> Vec<ForkInfo> {
    let Some(project_dir) = parent.parent() else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = agent_files(&project_dir.join(session_id).join("subagents"));
    for legacy in agent_files(project_dir) {
        let belongs = extract_claude_header(&legacy)
            .ok()
            .and_then(|h| h.session_id)
            .is_some_and(|id| id == session_id);
        if belongs {
            files.push(legacy);
        }
    }
    if files.is_empty() {
        return Vec::new();
    }

    let index = TaskIndex::scan(parent);
    let mut forks: Vec<ForkInfo> = files
        .into_iter()
        .filter_map(|path| {
            let agent_id = path.file_stem()?.to_str()?.strip_prefix(AGENT_PREFIX)?.to_string();
            let first_prompt = extract_claude_header(&path).ok().and_then(|h| h.first_prompt);
            let call = index.attribute(&agent_id, first_prompt.as_deref());

            let mut reader = JsonlTailReader::new(&path, ClaudeNormalizer::new(&agent_id));
            let events = reader.read_all();

            Some(ForkInfo {
                id: agent_id,
                path,
                agent_type: call.agent_type,
                description: call.description,
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

fn agent_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension().is_some_and(|ext| ext == "jsonl")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(AGENT_PREFIX))
        })
        .collect();
    files.sort();
    files
}
