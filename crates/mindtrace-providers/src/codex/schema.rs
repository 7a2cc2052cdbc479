use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One line of a Codex rollout file
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum CodexRecord {
    SessionMeta(SessionMetaRecord),
    ResponseItem(ResponseItemRecord),
    Compacted(CompactedRecord),
    TurnContext(TurnContextRecord),
    EventMsg(EventMsgRecord),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct SessionMetaRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: SessionMetaPayload,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct SessionMetaPayload {
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub source: Option<SessionSource>,
    /// Explicit parent link written by newer releases
    #[serde(default, alias = "forked_from_id")]
    pub parent_session_id: Option<String>,
}

/// `"cli"`, `"exec"`, `{"subagent": "review"}` or `{"subagent": {"thread_spawn": {...}}}`
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub(crate) enum SessionSource {
    Subagent { subagent: Value },
    Other(Value),
}

impl SessionSource {
    pub fn subagent_type(&self) -> Option<String> {
        match self {
            SessionSource::Subagent { subagent: Value::String(s) } => Some(s.clone()),
            SessionSource::Subagent { subagent: Value::Object(map) } => map.keys().next().cloned(),
            _ => None,
        }
    }

    /// Parent thread id nested anywhere under the subagent descriptor
    pub fn parent_id(&self) -> Option<String> {
        fn find(value: &Value) -> Option<String> {
            match value {
                Value::Object(map) => {
                    for key in ["parent_thread_id", "parent_session_id", "parent_id"] {
                        if let Some(Value::String(id)) = map.get(key) {
                            return Some(id.clone());
                        }
                    }
                    map.values().find_map(find)
                }
                _ => None,
            }
        }
        match self {
            SessionSource::Subagent { subagent } => find(subagent),
            SessionSource::Other(_) => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ResponseItemRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: ResponseItemPayload,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum ResponseItemPayload {
    Message {
        role: String,
        #[serde(default)]
        content: Vec<MessageContent>,
    },
    Reasoning {
        #[serde(default)]
        summary: Vec<SummaryText>,
    },
    FunctionCall {
        name: String,
        #[serde(default)]
        arguments: String,
        call_id: String,
    },
    FunctionCallOutput {
        call_id: String,
        #[serde(default)]
        output: Value,
    },
    CustomToolCall {
        call_id: String,
        name: String,
        #[serde(default)]
        input: String,
    },
    CustomToolCallOutput {
        call_id: String,
        #[serde(default)]
        output: Value,
    },
    LocalShellCall {
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        action: Value,
    },
    WebSearchCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        action: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum MessageContent {
    InputText { text: String },
    OutputText { text: String },
    InputImage {},
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum SummaryText {
    SummaryText { text: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct CompactedRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: CompactedPayload,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct CompactedPayload {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct TurnContextRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: TurnContextPayload,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct TurnContextPayload {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct EventMsgRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: EventMsgPayload,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum EventMsgPayload {
    TokenCount {
        #[serde(default)]
        info: Option<TokenInfo>,
        #[serde(default)]
        rate_limits: Option<Value>,
    },
    ExecCommandBegin {
        call_id: String,
        #[serde(default)]
        command: Value,
        #[serde(default)]
        cwd: Option<String>,
    },
    ExecCommandEnd {
        call_id: String,
        #[serde(default)]
        stdout: String,
        #[serde(default)]
        stderr: String,
        #[serde(default)]
        aggregated_output: String,
        #[serde(default)]
        exit_code: i64,
        #[serde(default)]
        duration: Option<Value>,
    },
    PatchApplyBegin {
        call_id: String,
        #[serde(default)]
        changes: Map<String, Value>,
    },
    PatchApplyEnd {
        call_id: String,
        #[serde(default)]
        stdout: String,
        #[serde(default)]
        stderr: String,
        #[serde(default = "default_true")]
        success: bool,
    },
    McpToolCallBegin {
        call_id: String,
        #[serde(default)]
        invocation: McpInvocation,
    },
    McpToolCallEnd {
        call_id: String,
        #[serde(default)]
        invocation: McpInvocation,
        #[serde(default)]
        duration: Option<Value>,
        #[serde(default)]
        result: Value,
    },
    EnteredReviewMode {},
    #[serde(other)]
    Unknown,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct McpInvocation {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct TokenInfo {
    #[serde(default)]
    pub last_token_usage: Option<CodexUsage>,
    #[serde(default)]
    pub model_context_window: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub(crate) struct CodexUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub reasoning_output_tokens: u64,
}
