use chrono::{DateTime, Utc};
use mindtrace_types::{CanonicalEvent, ContentBlock, TokenUsage};
use serde_json::Value;

use super::schema::{
    AssistantContent, AssistantRecord, ClaudeRecord, ClaudeUsage, SummaryRecord, UserContent,
    UserRecord,
};
use crate::ids::{EventIds, SemanticSuffix};
use crate::traits::RecordNormalizer;
use crate::Result;

/// Claude Code records already carry one message each; this maps them 1:1
///
/// `summary` records have no timestamp of their own and take the last one
/// seen. Summaries leading the file are held until the first timestamped
/// record and emitted just before it.
#[derive(Debug)]
pub struct ClaudeNormalizer {
    ids: EventIds,
    last_timestamp: Option<DateTime<Utc>>,
    pending_summaries: Vec<SummaryRecord>,
}

impl ClaudeNormalizer {
    pub fn new(session_key: &str) -> Self {
        Self {
            ids: EventIds::new(session_key),
            last_timestamp: None,
            pending_summaries: Vec::new(),
        }
    }

    /// Record the latest timestamp, releasing any summaries held for it
    fn stamp(&mut self, timestamp: DateTime<Utc>) -> Vec<CanonicalEvent> {
        self.last_timestamp = Some(timestamp);
        std::mem::take(&mut self.pending_summaries)
            .into_iter()
            .map(|record| self.summary_at(record, timestamp))
            .collect()
    }

    fn user(&mut self, record: UserRecord) -> Vec<CanonicalEvent> {
        let mut events = self.stamp(record.timestamp);
        let duration = record.result_duration_ms();

        let content: Vec<ContentBlock> = record
            .message
            .content
            .into_iter()
            .filter_map(|block| match block {
                UserContent::Text { text } => Some(ContentBlock::text(text)),
                UserContent::Image { .. } => Some(ContentBlock::text("[Image]")),
                UserContent::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some(ContentBlock::tool_result(
                    tool_use_id,
                    flatten_result(content.as_ref()),
                    is_error,
                    duration,
                )),
                UserContent::Unknown => None,
            })
            .collect();

        if !content.is_empty() {
            events.push(CanonicalEvent::user(record.uuid, record.timestamp, content));
        }
        events
    }

    fn assistant(&mut self, record: AssistantRecord) -> Vec<CanonicalEvent> {
        let mut events = self.stamp(record.timestamp);
        let message = record.message;

        let content: Vec<ContentBlock> = message
            .content
            .into_iter()
            .filter_map(|block| match block {
                AssistantContent::Text { text } => Some(ContentBlock::text(text)),
                AssistantContent::Thinking { thinking } if !thinking.is_empty() => {
                    Some(ContentBlock::thinking(thinking))
                }
                AssistantContent::ToolUse { id, name, input } => {
                    Some(ContentBlock::tool_use(id, name, input))
                }
                _ => None,
            })
            .collect();
        let usage = message.usage.map(to_usage).filter(|u| !u.is_empty());

        if !content.is_empty() || usage.is_some() {
            let id = message.id.unwrap_or(record.uuid);
            events.push(CanonicalEvent::assistant(
                id,
                record.timestamp,
                message.model,
                usage,
                content,
            ));
        }
        events
    }

    fn summary(&mut self, record: SummaryRecord) -> Vec<CanonicalEvent> {
        match self.last_timestamp {
            Some(timestamp) => vec![self.summary_at(record, timestamp)],
            None => {
                self.pending_summaries.push(record);
                Vec::new()
            }
        }
    }

    fn summary_at(&self, record: SummaryRecord, timestamp: DateTime<Utc>) -> CanonicalEvent {
        let id = record
            .leaf_uuid
            .as_deref()
            .map(|leaf| self.ids.id(leaf, SemanticSuffix::Summary))
            .unwrap_or_else(|| self.ids.id(&record.summary, SemanticSuffix::Summary));
        CanonicalEvent::summary(id, timestamp, Some(record.summary))
    }
}

impl RecordNormalizer for ClaudeNormalizer {
    fn normalize_line(&mut self, line: &str) -> Result<Vec<CanonicalEvent>> {
        let record: ClaudeRecord = serde_json::from_str(line)?;
        Ok(match record {
            ClaudeRecord::User(r) => self.user(r),
            ClaudeRecord::Assistant(r) => self.assistant(r),
            ClaudeRecord::Summary(r) => self.summary(r),
            ClaudeRecord::Unknown => Vec::new(),
        })
    }

    fn reset(&mut self) {
        self.last_timestamp = None;
        self.pending_summaries.clear();
    }
}

fn to_usage(usage: ClaudeUsage) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        cache_read_input_tokens: usage.cache_read_input_tokens.unwrap_or(0),
        cache_creation_input_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
        reasoning_output_tokens: 0,
    }
}

/// Tool result content is a string or an array of text/image blocks
pub(crate) fn flatten_result(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item.get("type").and_then(|t| t.as_str()) {
                Some("text") => item.get("text").and_then(|t| t.as_str()).map(str::to_string),
                Some("image") => Some("[Image]".to_string()),
                _ => item.as_str().map(str::to_string),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}
