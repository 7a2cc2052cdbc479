use chrono::{DateTime, Utc};
use mindtrace_types::{CanonicalEvent, ContentBlock, TokenUsage};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};

use super::schema::{
    CodexRecord, CodexUsage, EventMsgPayload, MessageContent, ResponseItemPayload, SummaryText,
};
use super::tools::{
    CallOutcome, canonical_call, command_string, mcp_tool_name, parse_call_output,
    parse_json_arguments, parse_mcp_result, patch_changes_input,
};
use crate::Result;
use crate::ids::{EventIds, SemanticSuffix};
use crate::traits::RecordNormalizer;

/// Begin half of an asynchronous call, waiting for its end record
#[derive(Debug, Clone)]
struct PendingCall {
    name: String,
    input: Value,
    started_at: DateTime<Utc>,
}

/// Completed call ids remembered for dropping second-channel ends
const MAX_COMPLETED_CALLS: usize = 1024;

/// Insertion-ordered id set that forgets its oldest entries past `cap`
#[derive(Debug)]
struct RecentIds {
    cap: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl RecentIds {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    fn insert(&mut self, id: &str) {
        if !self.members.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

/// Stateful normalizer for Codex rollout records
///
/// Tool calls arrive as begin/end record pairs (possibly through two channels
/// for the same call id: `response_item` and `event_msg`). Nothing is emitted
/// on begin; the first matching end emits a `tool_use` event at begin time and
/// a `tool_result` event at end time. Later ends for a recently completed id
/// are dropped. An end without a begin still emits both, with default input.
#[derive(Debug)]
pub struct CodexNormalizer {
    ids: EventIds,
    pending: HashMap<String, PendingCall>,
    completed: RecentIds,
    model: Option<String>,
    context_window: Option<u64>,
    rate_limits: Option<Value>,
    last_usage: Option<TokenUsage>,
    row: u64,
}

impl CodexNormalizer {
    pub fn new(session_key: &str) -> Self {
        Self {
            ids: EventIds::new(session_key),
            pending: HashMap::new(),
            completed: RecentIds::new(MAX_COMPLETED_CALLS),
            model: None,
            context_window: None,
            rate_limits: None,
            last_usage: None,
            row: 0,
        }
    }

    /// Model stamped on assistant events (last `turn_context` wins)
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    pub fn completed_calls(&self) -> usize {
        self.completed.len()
    }

    fn row_id(&self, suffix: SemanticSuffix) -> String {
        self.ids.id(&format!("row_{}", self.row), suffix)
    }

    fn begin(&mut self, call_id: String, name: String, input: Value, at: DateTime<Utc>) {
        if self.completed.contains(&call_id) {
            return;
        }
        // First begin wins: the response item carries the model's own arguments
        self.pending.entry(call_id).or_insert(PendingCall {
            name,
            input,
            started_at: at,
        });
    }

    fn end(
        &mut self,
        call_id: &str,
        at: DateTime<Utc>,
        outcome: CallOutcome,
        orphan: impl FnOnce() -> (String, Value),
    ) -> Vec<CanonicalEvent> {
        if self.completed.contains(call_id) {
            self.pending.remove(call_id);
            return Vec::new();
        }
        self.completed.insert(call_id);

        let (call, elapsed) = match self.pending.remove(call_id) {
            Some(call) => {
                let elapsed = (at - call.started_at).num_milliseconds();
                (call, u64::try_from(elapsed).ok())
            }
            None => {
                tracing::debug!(call_id, "end record without begin; synthesizing call");
                let (name, input) = orphan();
                (
                    PendingCall {
                        name,
                        input,
                        started_at: at,
                    },
                    None,
                )
            }
        };

        vec![
            CanonicalEvent::assistant(
                self.ids.id(call_id, SemanticSuffix::ToolCall),
                call.started_at,
                self.model.clone(),
                None,
                vec![ContentBlock::tool_use(call_id, call.name, call.input)],
            ),
            CanonicalEvent::user(
                self.ids.id(call_id, SemanticSuffix::ToolResult),
                at,
                vec![ContentBlock::tool_result(
                    call_id,
                    outcome.output,
                    outcome.is_error,
                    outcome.duration_ms.or(elapsed),
                )],
            ),
        ]
    }

    fn response_item(
        &mut self,
        payload: ResponseItemPayload,
        at: DateTime<Utc>,
    ) -> Vec<CanonicalEvent> {
        match payload {
            ResponseItemPayload::Message { role, content } => {
                let blocks: Vec<ContentBlock> = content
                    .into_iter()
                    .filter_map(|c| match c {
                        MessageContent::InputText { text }
                        | MessageContent::OutputText { text } => Some(ContentBlock::text(text)),
                        MessageContent::InputImage {} => Some(ContentBlock::text("[Image]")),
                        MessageContent::Unknown => None,
                    })
                    .collect();
                if blocks.is_empty() {
                    return Vec::new();
                }
                match role.as_str() {
                    "user" => vec![CanonicalEvent::user(
                        self.row_id(SemanticSuffix::Message),
                        at,
                        blocks,
                    )],
                    "assistant" => vec![CanonicalEvent::assistant(
                        self.row_id(SemanticSuffix::Message),
                        at,
                        self.model.clone(),
                        None,
                        blocks,
                    )],
                    // developer / system instructions
                    _ => Vec::new(),
                }
            }
            ResponseItemPayload::Reasoning { summary } => {
                let text = summary
                    .into_iter()
                    .filter_map(|s| match s {
                        SummaryText::SummaryText { text } => Some(text),
                        SummaryText::Unknown => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.trim().is_empty() {
                    return Vec::new();
                }
                vec![CanonicalEvent::assistant(
                    self.row_id(SemanticSuffix::Message),
                    at,
                    self.model.clone(),
                    None,
                    vec![ContentBlock::thinking(text)],
                )]
            }
            ResponseItemPayload::FunctionCall { name, arguments, call_id } => {
                let (name, input) = canonical_call(&name, parse_json_arguments(&arguments));
                self.begin(call_id, name, input, at);
                Vec::new()
            }
            ResponseItemPayload::CustomToolCall { call_id, name, input } => {
                let (name, input) = canonical_call(&name, Value::String(input));
                self.begin(call_id, name, input, at);
                Vec::new()
            }
            ResponseItemPayload::LocalShellCall { call_id, id, action } => {
                if let Some(call_id) = call_id.or(id) {
                    let command = action.get("command").map(command_string).unwrap_or_default();
                    self.begin(call_id, "Bash".to_string(), json!({ "command": command }), at);
                }
                Vec::new()
            }
            ResponseItemPayload::FunctionCallOutput { call_id, output }
            | ResponseItemPayload::CustomToolCallOutput { call_id, output } => {
                self.end(&call_id, at, parse_call_output(&output), || {
                    ("unknown".to_string(), json!({}))
                })
            }
            ResponseItemPayload::WebSearchCall { id, action } => {
                // Completed in a single record; no separate output
                let call_id = id.unwrap_or_else(|| self.row_id(SemanticSuffix::ToolCall));
                let query = action.get("query").cloned().unwrap_or(Value::String(String::new()));
                self.begin(call_id.clone(), "WebSearch".to_string(), json!({ "query": query }), at);
                self.end(&call_id, at, CallOutcome::default(), || {
                    ("WebSearch".to_string(), json!({ "query": "" }))
                })
            }
            ResponseItemPayload::Unknown => Vec::new(),
        }
    }

    fn event_msg(&mut self, payload: EventMsgPayload, at: DateTime<Utc>) -> Vec<CanonicalEvent> {
        match payload {
            EventMsgPayload::TokenCount { info, rate_limits } => {
                // Sparse: absent fields never clear a known value
                if rate_limits.as_ref().is_some_and(|r| !r.is_null()) {
                    self.rate_limits = rate_limits;
                }
                let Some(info) = info else {
                    return Vec::new();
                };
                if let Some(window) = info.model_context_window {
                    self.context_window = Some(window);
                }
                let Some(usage) = info.last_token_usage.map(to_usage) else {
                    return Vec::new();
                };
                if self.last_usage == Some(usage) {
                    return Vec::new();
                }
                self.last_usage = Some(usage);
                vec![CanonicalEvent::assistant(
                    self.row_id(SemanticSuffix::TokenUsage),
                    at,
                    self.model.clone(),
                    Some(usage),
                    Vec::new(),
                )]
            }
            EventMsgPayload::ExecCommandBegin { call_id, command, cwd } => {
                let mut input = json!({ "command": command_string(&command) });
                if let Some(cwd) = cwd {
                    input["cwd"] = Value::String(cwd);
                }
                self.begin(call_id, "Bash".to_string(), input, at);
                Vec::new()
            }
            EventMsgPayload::ExecCommandEnd {
                call_id,
                stdout,
                stderr,
                aggregated_output,
                exit_code,
                duration,
            } => {
                let output = if !aggregated_output.is_empty() {
                    aggregated_output
                } else if stderr.is_empty() {
                    stdout
                } else if stdout.is_empty() {
                    stderr
                } else {
                    format!("{}\n{}", stdout, stderr)
                };
                let outcome = CallOutcome {
                    output,
                    is_error: exit_code != 0,
                    duration_ms: duration.as_ref().and_then(super::tools::duration_ms),
                };
                self.end(&call_id, at, outcome, || ("Bash".to_string(), json!({ "command": "" })))
            }
            EventMsgPayload::PatchApplyBegin { call_id, changes } => {
                self.begin(call_id, "Edit".to_string(), patch_changes_input(&changes), at);
                Vec::new()
            }
            EventMsgPayload::PatchApplyEnd {
                call_id,
                stdout,
                stderr,
                success,
            } => {
                let outcome = CallOutcome {
                    output: if success || stderr.is_empty() { stdout } else { stderr },
                    is_error: !success,
                    duration_ms: None,
                };
                self.end(&call_id, at, outcome, || ("Edit".to_string(), json!({ "file_path": "" })))
            }
            EventMsgPayload::McpToolCallBegin { call_id, invocation } => {
                let name = mcp_tool_name(&invocation.server, &invocation.tool);
                let input = invocation.arguments.unwrap_or_else(|| json!({}));
                self.begin(call_id, name, input, at);
                Vec::new()
            }
            EventMsgPayload::McpToolCallEnd {
                call_id,
                invocation,
                duration,
                result,
            } => {
                let outcome = parse_mcp_result(&result, duration.as_ref());
                self.end(&call_id, at, outcome, move || {
                    (
                        mcp_tool_name(&invocation.server, &invocation.tool),
                        invocation.arguments.unwrap_or_else(|| json!({})),
                    )
                })
            }
            EventMsgPayload::EnteredReviewMode {} | EventMsgPayload::Unknown => Vec::new(),
        }
    }
}

impl RecordNormalizer for CodexNormalizer {
    fn normalize_line(&mut self, line: &str) -> Result<Vec<CanonicalEvent>> {
        let record: CodexRecord = serde_json::from_str(line)?;
        self.row += 1;

        Ok(match record {
            CodexRecord::SessionMeta(_) | CodexRecord::Unknown => Vec::new(),
            CodexRecord::TurnContext(turn) => {
                if let Some(model) = turn.payload.model {
                    self.model = Some(model);
                }
                Vec::new()
            }
            CodexRecord::Compacted(record) => {
                let text = Some(record.payload.message).filter(|m| !m.trim().is_empty());
                vec![CanonicalEvent::summary(
                    self.row_id(SemanticSuffix::Summary),
                    record.timestamp,
                    text,
                )]
            }
            CodexRecord::ResponseItem(item) => self.response_item(item.payload, item.timestamp),
            CodexRecord::EventMsg(event) => self.event_msg(event.payload, event.timestamp),
        })
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.completed.clear();
        self.model = None;
        self.context_window = None;
        self.rate_limits = None;
        self.last_usage = None;
        self.row = 0;
    }

    fn reported_context_window(&self) -> Option<u64> {
        self.context_window
    }

    fn rate_limits(&self) -> Option<Value> {
        self.rate_limits.clone()
    }
}

fn to_usage(usage: CodexUsage) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        cache_read_input_tokens: usage.cached_input_tokens,
        cache_creation_input_tokens: 0,
        reasoning_output_tokens: usage.reasoning_output_tokens,
    }
}
