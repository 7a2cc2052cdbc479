use chrono::{DateTime, Utc};
use mindtrace_types::{single_line, truncate};
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::schema::{CodexRecord, EventMsgPayload, MessageContent, ResponseItemPayload};
use crate::claude::io::LABEL_MAX_CHARS;

const HEADER_LINES: usize = 20;

/// Injected context blocks that look like user messages but are not prompts
const INJECTED_PREFIXES: &[&str] = &[
    "<environment_context>",
    "<user_instructions>",
    "# AGENTS.md",
    "<INSTRUCTIONS>",
];

#[derive(Debug, Default, Clone)]
pub struct CodexHeader {
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub first_prompt: Option<String>,
    pub subagent_type: Option<String>,
    pub parent_session_id: Option<String>,
}

impl CodexHeader {
    pub fn label(&self) -> Option<String> {
        self.first_prompt
            .as_deref()
            .map(|text| truncate(&single_line(text), LABEL_MAX_CHARS))
            .filter(|label| !label.is_empty())
    }
}

/// Session id from a rollout filename
///
/// `rollout-2025-06-01T10-00-00-0197a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b.jsonl`
/// ends in a UUID: its five trailing dash-separated groups.
pub fn session_id_from_filename(filename: &str) -> Option<String> {
    let name = filename.strip_suffix(".jsonl")?;
    let parts: Vec<&str> = name.split('-').collect();
    if parts.len() < 5 {
        return None;
    }
    let candidate = parts[parts.len() - 5..].join("-");
    uuid::Uuid::parse_str(&candidate).ok().map(|_| candidate)
}

pub fn extract_codex_header(path: &Path) -> std::io::Result<CodexHeader> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut header = CodexHeader::default();

    for line in reader.lines().take(HEADER_LINES).map_while(|l| l.ok()) {
        let Ok(record) = serde_json::from_str::<CodexRecord>(&line) else {
            continue;
        };
        match record {
            CodexRecord::SessionMeta(meta) => {
                let payload = meta.payload;
                header.session_id.get_or_insert(payload.id);
                if header.cwd.is_none() {
                    header.cwd = payload.cwd;
                }
                header.started_at.get_or_insert(payload.timestamp.unwrap_or(meta.timestamp));
                if let Some(source) = &payload.source {
                    header.subagent_type =
                        header.subagent_type.take().or_else(|| source.subagent_type());
                    header.parent_session_id =
                        header.parent_session_id.take().or_else(|| source.parent_id());
                }
                if payload.parent_session_id.is_some() {
                    header.parent_session_id = payload.parent_session_id;
                }
            }
            CodexRecord::TurnContext(turn) => {
                if header.cwd.is_none() {
                    header.cwd = turn.payload.cwd;
                }
            }
            CodexRecord::ResponseItem(item) => {
                if header.first_prompt.is_some() {
                    continue;
                }
                if let ResponseItemPayload::Message { role, content } = item.payload
                    && role == "user"
                {
                    header.first_prompt = content.into_iter().find_map(|c| match c {
                        MessageContent::InputText { text } if !is_injected(&text) => Some(text),
                        _ => None,
                    });
                }
            }
            _ => {}
        }

        if header.session_id.is_some() && header.cwd.is_some() && header.first_prompt.is_some() {
            break;
        }
    }

    Ok(header)
}

fn is_injected(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.is_empty() || INJECTED_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

/// Timestamps of `entered_review_mode` events, where review subagents are spawned
pub fn extract_review_spawns(path: &Path) -> Vec<DateTime<Utc>> {
    let Ok(file) = std::fs::File::open(path) else {
        return Vec::new();
    };
    BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .filter(|line| line.contains("entered_review_mode"))
        .filter_map(|line| match serde_json::from_str::<CodexRecord>(&line) {
            Ok(CodexRecord::EventMsg(event))
                if matches!(event.payload, EventMsgPayload::EnteredReviewMode {}) =>
            {
                Some(event.timestamp)
            }
            _ => None,
        })
        .collect()
}
