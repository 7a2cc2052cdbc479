use mindtrace_types::{CanonicalEvent, ContentBlock, TokenUsage};

use super::schema::{MessageInfo, MessageTokens, Part, PartKind, millis_to_datetime};
use super::tools::{canonical_input, canonical_tool_name, result_text};
use crate::ids::{EventIds, SemanticSuffix};

/// Fold one message and its parts into canonical events
///
/// Output order: the message itself, one user `tool_result` event per finished
/// tool part, then at most one summary event. Both stores route through here.
pub(crate) fn fold_message(
    ids: &EventIds,
    message: &MessageInfo,
    parts: Vec<Part>,
) -> Vec<CanonicalEvent> {
    fold_fresh_parts(ids, message, parts, |_| true)
}

/// `fold_message` where only parts accepted by `fresh` yield content blocks
/// and tool results
///
/// Every part still feeds compaction detection and the summary text.
pub(crate) fn fold_fresh_parts(
    ids: &EventIds,
    message: &MessageInfo,
    mut parts: Vec<Part>,
    fresh: impl Fn(&Part) -> bool,
) -> Vec<CanonicalEvent> {
    parts.sort_by_key(|p| p.index.unwrap_or(0));

    let created = message.created_at();
    let mut content = Vec::new();
    let mut results = Vec::new();
    let mut compaction = message.is_compaction();
    let mut summary_text = Vec::new();

    for part in parts {
        let emit = fresh(&part);
        match part.kind {
            PartKind::Text { text, synthetic } => {
                if synthetic || text.trim().is_empty() {
                    continue;
                }
                summary_text.push(text.clone());
                if emit {
                    content.push(ContentBlock::text(text));
                }
            }
            PartKind::Compaction {} => compaction = true,
            _ if !emit => {}
            PartKind::Reasoning { text } => {
                if !text.trim().is_empty() {
                    content.push(ContentBlock::thinking(text));
                }
            }
            PartKind::File { mime, filename } => {
                let name = filename.unwrap_or_else(|| "file".to_string());
                content.push(ContentBlock::text(format!("[File: {} ({})]", name, mime)));
            }
            PartKind::Tool { call_id, tool, state } => {
                content.push(ContentBlock::tool_use(
                    call_id.clone(),
                    canonical_tool_name(&tool),
                    canonical_input(&state.input),
                ));
                if state.is_finished() {
                    let ended = state
                        .time
                        .and_then(|t| t.end)
                        .or(message.time.completed)
                        .map(millis_to_datetime)
                        .unwrap_or(created);
                    let output = result_text(state.output.as_ref(), state.error.as_deref());
                    results.push(CanonicalEvent::user(
                        ids.id(&call_id, SemanticSuffix::ToolResult),
                        ended,
                        vec![ContentBlock::tool_result(
                            call_id,
                            output,
                            state.status == "error",
                            state.duration_ms(),
                        )],
                    ));
                }
            }
            PartKind::Unknown => {}
        }
    }

    let mut events = Vec::with_capacity(1 + results.len() + compaction as usize);
    match message.role.as_str() {
        "assistant" => {
            let usage = message.tokens.map(to_usage).filter(|u| !u.is_empty());
            if !content.is_empty() || usage.is_some() {
                events.push(CanonicalEvent::assistant(
                    message.id.clone(),
                    created,
                    message.model_id.clone(),
                    usage,
                    content,
                ));
            }
        }
        _ => {
            if !content.is_empty() {
                events.push(CanonicalEvent::user(message.id.clone(), created, content));
            }
        }
    }
    events.extend(results);

    if compaction {
        let text = (message.is_compaction() && !summary_text.is_empty())
            .then(|| summary_text.join("\n"));
        events.push(CanonicalEvent::summary(
            ids.id(&message.id, SemanticSuffix::Summary),
            created,
            text,
        ));
    }
    events
}

fn to_usage(tokens: MessageTokens) -> TokenUsage {
    TokenUsage {
        input_tokens: tokens.input,
        output_tokens: tokens.output,
        cache_read_input_tokens: tokens.cache.read,
        cache_creation_input_tokens: tokens.cache.write,
        reasoning_output_tokens: tokens.reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: serde_json::Value) -> MessageInfo {
        serde_json::from_value(value).unwrap()
    }

    fn part(value: serde_json::Value) -> Part {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_file_only_user_message() {
        let ids = EventIds::new("ses_1");
        let msg = message(json!({"id": "msg_1", "role": "user",
            "time": {"created": 1_700_000_000_000i64}}));
        let parts = vec![part(json!({"id": "prt_1", "type": "file", "mime": "image/png",
            "filename": "x.png"}))];

        let events = fold_message(&ids, &msg, parts);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_user());
        assert_eq!(
            events[0].message.content,
            vec![ContentBlock::text("[File: x.png (image/png)]")]
        );
    }

    #[test]
    fn test_parts_sorted_by_index() {
        let ids = EventIds::new("ses_1");
        let msg = message(json!({"id": "msg_2", "role": "assistant", "time": {"created": 1000}}));
        let parts = vec![
            part(json!({"id": "b", "index": 2, "type": "text", "text": "second"})),
            part(json!({"id": "a", "type": "reasoning", "text": "first"})),
            part(json!({"id": "c", "index": 1, "type": "text", "text": "middle"})),
        ];

        let events = fold_message(&ids, &msg, parts);
        assert_eq!(
            events[0].message.content,
            vec![
                ContentBlock::thinking("first"),
                ContentBlock::text("middle"),
                ContentBlock::text("second"),
            ]
        );
    }

    #[test]
    fn test_finished_tools_emit_results() {
        let ids = EventIds::new("ses_1");
        let msg = message(json!({
            "id": "msg_3", "role": "assistant", "modelID": "claude-sonnet-4-5",
            "time": {"created": 1000, "completed": 5000},
            "tokens": {"input": 10, "output": 5, "reasoning": 0, "cache": {"read": 100, "write": 7}}
        }));
        let parts = vec![
            part(json!({"id": "p1", "type": "tool", "callID": "c1", "tool": "read",
                "state": {"status": "completed", "input": {"filePath": "/a.rs"},
                          "output": "fn main", "time": {"start": 1100, "end": 1300}}})),
            part(json!({"id": "p2", "type": "tool", "callID": "c2", "tool": "bash",
                "state": {"status": "error", "input": {"command": "false"}, "error": "exit 1"}})),
            part(json!({"id": "p3", "type": "tool", "callID": "c3", "tool": "bash",
                "state": {"status": "running", "input": {"command": "sleep 9"}}})),
        ];

        let events = fold_message(&ids, &msg, parts);
        assert_eq!(events.len(), 3);

        let assistant = &events[0];
        assert_eq!(assistant.message.model.as_deref(), Some("claude-sonnet-4-5"));
        assert_eq!(assistant.message.usage.unwrap().cache_creation_input_tokens, 7);
        let uses: Vec<_> = assistant.tool_uses().collect();
        assert_eq!(uses.len(), 3);
        assert_eq!(uses[0].1, "Read");
        assert_eq!(uses[0].2["file_path"], "/a.rs");

        assert_eq!(
            events[1].message.content,
            vec![ContentBlock::tool_result("c1", "fn main", false, Some(200))]
        );
        assert_eq!(events[1].timestamp, millis_to_datetime(1300));
        assert_eq!(
            events[2].message.content,
            vec![ContentBlock::tool_result("c2", "exit 1", true, None)]
        );
        assert_eq!(events[2].timestamp, millis_to_datetime(5000));
    }

    #[test]
    fn test_compaction_flag_or_part_yields_one_summary() {
        let ids = EventIds::new("ses_1");
        let flagged = message(json!({"id": "m1", "role": "assistant", "summary": true,
            "time": {"created": 1}}));
        let parts = vec![
            part(json!({"id": "p", "type": "text", "text": "Summary of work"})),
            part(json!({"id": "q", "type": "compaction", "auto": true})),
        ];
        let events = fold_message(&ids, &flagged, parts);
        let summaries: Vec<_> = events.iter().filter(|e| e.is_summary()).collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].text(), "Summary of work");

        let marked = message(json!({"id": "m2", "role": "user", "time": {"created": 2}}));
        let parts = vec![part(json!({"id": "q", "type": "compaction"}))];
        let events = fold_message(&ids, &marked, parts);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_summary());
        assert!(events[0].message.content.is_empty());
    }
}
