use mindtrace_types::{CanonicalEvent, ContentBlock, TokenUsage};
use std::collections::{HashMap, HashSet};

use crate::stats::{ForkStats, SessionStats, ToolCall, file_changes, latest_todos, tracked_tasks};

/// Result seen before its call; applied once the call arrives
#[derive(Debug, Clone)]
struct PendingResult {
    content: String,
    is_error: bool,
    duration_ms: Option<u64>,
}

/// Tool-call history keyed by call id
///
/// Re-ingesting an event (snapshot re-emission, reader reset) updates the
/// existing entry in place instead of appending a duplicate.
#[derive(Debug, Default)]
struct CallLog {
    calls: Vec<ToolCall>,
    index: HashMap<String, usize>,
    early_results: HashMap<String, PendingResult>,
}

impl CallLog {
    fn ingest(&mut self, event: &CanonicalEvent) {
        for block in &event.message.content {
            match block {
                ContentBlock::ToolUse { id, name, input } => {
                    if let Some(&slot) = self.index.get(id) {
                        let call = &mut self.calls[slot];
                        call.name = name.clone();
                        call.input = input.clone();
                        continue;
                    }
                    let mut call = ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                        timestamp: event.timestamp,
                        output: None,
                        is_error: false,
                        duration_ms: None,
                    };
                    if let Some(result) = self.early_results.remove(id) {
                        apply(&mut call, result);
                    }
                    self.index.insert(id.clone(), self.calls.len());
                    self.calls.push(call);
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                    duration,
                } => {
                    let result = PendingResult {
                        content: content.clone(),
                        is_error: *is_error,
                        duration_ms: *duration,
                    };
                    match self.index.get(tool_use_id) {
                        Some(&slot) => apply(&mut self.calls[slot], result),
                        None => {
                            self.early_results.insert(tool_use_id.clone(), result);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Calls in time order; ties keep first-seen order
    fn ordered(&self) -> Vec<ToolCall> {
        let mut calls = self.calls.clone();
        calls.sort_by_key(|c| c.timestamp);
        calls
    }
}

fn apply(call: &mut ToolCall, result: PendingResult) {
    call.output = Some(result.content);
    call.is_error = result.is_error;
    call.duration_ms = result.duration_ms;
}

#[derive(Debug)]
struct ForkLog {
    id: String,
    agent_type: Option<String>,
    description: Option<String>,
    calls: CallLog,
}

/// Folds canonical events into `SessionStats`
///
/// Every ingest is idempotent: tool calls are keyed by call id and usage by
/// message id (last report wins), so replaying a stream or receiving a
/// message snapshot twice leaves the statistics unchanged.
#[derive(Debug)]
pub struct StatsAccumulator {
    session_id: String,
    model: Option<String>,
    usage: HashMap<String, TokenUsage>,
    messages: HashSet<String>,
    calls: CallLog,
    forks: Vec<ForkLog>,
}

impl StatsAccumulator {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            model: None,
            usage: HashMap::new(),
            messages: HashSet::new(),
            calls: CallLog::default(),
            forks: Vec::new(),
        }
    }

    pub fn ingest(&mut self, event: &CanonicalEvent) {
        let message = &event.message;
        self.messages.insert(message.id.clone());
        if let Some(model) = &message.model {
            self.model = Some(model.clone());
        }
        if let Some(usage) = message.usage {
            self.usage.insert(message.id.clone(), usage);
        }
        self.calls.ingest(event);
    }

    pub fn ingest_all<'a>(&mut self, events: impl IntoIterator<Item = &'a CanonicalEvent>) {
        for event in events {
            self.ingest(event);
        }
    }

    /// Add or refresh a fork's event stream
    pub fn ingest_fork(
        &mut self,
        id: &str,
        agent_type: Option<&str>,
        description: Option<&str>,
        events: &[CanonicalEvent],
    ) {
        let pos = match self.forks.iter().position(|f| f.id == id) {
            Some(pos) => pos,
            None => {
                self.forks.push(ForkLog {
                    id: id.to_string(),
                    agent_type: None,
                    description: None,
                    calls: CallLog::default(),
                });
                self.forks.len() - 1
            }
        };
        let fork = &mut self.forks[pos];
        if agent_type.is_some() {
            fork.agent_type = agent_type.map(str::to_string);
        }
        if description.is_some() {
            fork.description = description.map(str::to_string);
        }
        for event in events {
            fork.calls.ingest(event);
        }
    }

    pub fn tool_call_count(&self) -> usize {
        self.calls.calls.len()
    }

    /// Snapshot of everything ingested so far
    pub fn stats(&self) -> SessionStats {
        let calls = self.calls.ordered();
        let usage = self.usage.values().fold(TokenUsage::default(), |acc, u| TokenUsage {
            input_tokens: acc.input_tokens + u.input_tokens,
            output_tokens: acc.output_tokens + u.output_tokens,
            cache_read_input_tokens: acc.cache_read_input_tokens + u.cache_read_input_tokens,
            cache_creation_input_tokens: acc.cache_creation_input_tokens
                + u.cache_creation_input_tokens,
            reasoning_output_tokens: acc.reasoning_output_tokens + u.reasoning_output_tokens,
        });

        SessionStats {
            session_id: self.session_id.clone(),
            model: self.model.clone(),
            usage,
            message_count: self.messages.len(),
            files: file_changes(&calls),
            tasks: tracked_tasks(&calls),
            todos: latest_todos(&calls),
            tool_calls: calls,
            forks: self
                .forks
                .iter()
                .map(|fork| {
                    let calls = fork.calls.ordered();
                    ForkStats {
                        id: fork.id.clone(),
                        agent_type: fork.agent_type.clone(),
                        description: fork.description.clone(),
                        files: file_changes(&calls),
                        tool_calls: calls,
                    }
                })
                .collect(),
        }
    }
}
