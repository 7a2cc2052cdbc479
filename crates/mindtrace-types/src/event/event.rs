use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::ContentBlock;
use super::usage::TokenUsage;

// NOTE: Canonical Event Contract
//
// Every provider normalizer emits this shape and nothing else. Consumers
// (aggregators, cost trackers, graph builders) must never look at a
// provider-native record.
//
// - An assistant event may carry `usage` with empty `content`: token
//   accounting does not depend on visible text.
// - Events are transient. Identity across re-emission is `message.id`
//   (and `tool_use.id` for calls), never the event position in a stream.

/// Top-level event discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    User,
    Assistant,
    Summary,
}

/// Author of a canonical message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub role: Role,

    /// Provider message id, or a deterministic synthetic id for events
    /// that have no native message (paired tool calls, usage snapshots)
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// Normalized event produced by every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,

    pub message: CanonicalMessage,

    /// Event timestamp (UTC, serialized as RFC 3339)
    pub timestamp: DateTime<Utc>,
}

impl CanonicalEvent {
    pub fn user(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        content: Vec<ContentBlock>,
    ) -> Self {
        Self {
            event_type: EventType::User,
            message: CanonicalMessage {
                role: Role::User,
                id: id.into(),
                model: None,
                usage: None,
                content,
            },
            timestamp,
        }
    }

    pub fn assistant(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        model: Option<String>,
        usage: Option<TokenUsage>,
        content: Vec<ContentBlock>,
    ) -> Self {
        Self {
            event_type: EventType::Assistant,
            message: CanonicalMessage {
                role: Role::Assistant,
                id: id.into(),
                model,
                usage,
                content,
            },
            timestamp,
        }
    }

    /// Context-compaction marker; the summary text (if any) is its only content
    pub fn summary(id: impl Into<String>, timestamp: DateTime<Utc>, text: Option<String>) -> Self {
        Self {
            event_type: EventType::Summary,
            message: CanonicalMessage {
                role: Role::System,
                id: id.into(),
                model: None,
                usage: None,
                content: text.map(ContentBlock::text).into_iter().collect(),
            },
            timestamp,
        }
    }

    pub fn is_user(&self) -> bool {
        self.event_type == EventType::User
    }

    pub fn is_assistant(&self) -> bool {
        self.event_type == EventType::Assistant
    }

    pub fn is_summary(&self) -> bool {
        self.event_type == EventType::Summary
    }

    /// Visible text blocks joined by newlines
    pub fn text(&self) -> String {
        self.message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.message.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ContentBlock> {
        self.message
            .content
            .iter()
            .filter(|block| matches!(block, ContentBlock::ToolResult { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_assistant_serializes_to_canonical_shape() {
        let event = CanonicalEvent::assistant(
            "msg_1",
            ts(),
            Some("claude-sonnet-4-5".to_string()),
            None,
            vec![ContentBlock::text("hello")],
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "assistant");
        assert_eq!(json["message"]["role"], "assistant");
        assert_eq!(json["message"]["id"], "msg_1");
        assert_eq!(json["message"]["model"], "claude-sonnet-4-5");
        assert_eq!(json["message"]["content"][0]["type"], "text");
        assert_eq!(json["timestamp"], "2025-03-01T12:00:00Z");
        assert!(json["message"].get("usage").is_none());
    }

    #[test]
    fn test_usage_only_assistant_event_is_valid() {
        let usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 2,
            ..Default::default()
        };
        let event = CanonicalEvent::assistant("u1", ts(), None, Some(usage), Vec::new());

        let json = serde_json::to_string(&event).unwrap();
        let back: CanonicalEvent = serde_json::from_str(&json).unwrap();
        assert!(back.message.content.is_empty());
        assert_eq!(back.message.usage.unwrap().input_tokens, 10);
    }

    #[test]
    fn test_summary_has_system_role() {
        let event = CanonicalEvent::summary("s1", ts(), Some("compacted".to_string()));
        assert!(event.is_summary());
        assert_eq!(event.message.role, Role::System);
        assert_eq!(event.text(), "compacted");
    }
}
