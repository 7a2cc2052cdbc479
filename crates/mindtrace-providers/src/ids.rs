use uuid::Uuid;

/// What a synthesized message stands for; part of the id name
#[derive(Debug, Clone, Copy)]
pub(crate) enum SemanticSuffix {
    ToolCall,
    ToolResult,
    TokenUsage,
    Summary,
    Message,
}

impl SemanticSuffix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolCall => "call",
            Self::ToolResult => "result",
            Self::TokenUsage => "usage",
            Self::Summary => "summary",
            Self::Message => "message",
        }
    }
}

/// Deterministic ids for events that have no native message id
///
/// UUID v5 with a per-session namespace and `"<base>:<suffix>"` as the name, so
/// re-reading the same source yields the same ids.
#[derive(Debug, Clone)]
pub(crate) struct EventIds {
    namespace: Uuid,
}

impl EventIds {
    pub fn new(session_key: &str) -> Self {
        Self {
            namespace: Uuid::new_v5(&Uuid::NAMESPACE_OID, session_key.as_bytes()),
        }
    }

    pub fn id(&self, base: &str, suffix: SemanticSuffix) -> String {
        let name = format!("{}:{}", base, suffix.as_str());
        Uuid::new_v5(&self.namespace, name.as_bytes()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_deterministic_and_distinct() {
        let a = EventIds::new("session-a");
        let b = EventIds::new("session-b");
        let call = a.id("call_1", SemanticSuffix::ToolCall);
        assert_eq!(call, a.id("call_1", SemanticSuffix::ToolCall));
        assert_ne!(call, a.id("call_1", SemanticSuffix::ToolResult));
        assert_ne!(call, b.id("call_1", SemanticSuffix::ToolCall));
    }
}
