use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// One line of a Claude Code session file
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "kebab-case")]
pub(crate) enum ClaudeRecord {
    User(UserRecord),
    Assistant(AssistantRecord),
    Summary(SummaryRecord),
    #[serde(other)]
    Unknown,
}

impl ClaudeRecord {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ClaudeRecord::User(r) => Some(&r.session_id),
            ClaudeRecord::Assistant(r) => Some(&r.session_id),
            _ => None,
        }
    }

    pub fn cwd(&self) -> Option<&str> {
        match self {
            ClaudeRecord::User(r) => r.cwd.as_deref(),
            ClaudeRecord::Assistant(r) => r.cwd.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRecord {
    pub uuid: String,
    #[serde(default)]
    pub parent_uuid: Option<String>,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: UserMessage,
    #[serde(default)]
    pub is_meta: bool,
    #[serde(default)]
    pub cwd: Option<String>,
    /// Structured tool outcome; an object for most tools, a bare string on errors
    #[serde(default)]
    pub tool_use_result: Option<Value>,
}

impl UserRecord {
    /// Sidechain agent id reported by a finished `Task` call
    pub fn result_agent_id(&self) -> Option<&str> {
        self.tool_use_result.as_ref()?.get("agentId")?.as_str()
    }

    /// Tool execution time in milliseconds
    pub fn result_duration_ms(&self) -> Option<u64> {
        let result = self.tool_use_result.as_ref()?;
        result
            .get("durationMs")
            .or_else(|| result.get("totalDurationMs"))
            .and_then(|v| v.as_u64())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct UserMessage {
    #[serde(deserialize_with = "deserialize_user_content")]
    pub content: Vec<UserContent>,
}

fn deserialize_user_content<'de, D>(deserializer: D) -> Result<Vec<UserContent>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrArray {
        String(String),
        Array(Vec<UserContent>),
    }

    match StringOrArray::deserialize(deserializer)? {
        StringOrArray::String(s) => Ok(vec![UserContent::Text { text: s }]),
        StringOrArray::Array(arr) => Ok(arr),
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum UserContent {
    Text {
        text: String,
    },
    Image {},
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssistantRecord {
    pub uuid: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: AssistantMessage,
    #[serde(default)]
    pub cwd: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct AssistantMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Vec<AssistantContent>,
    #[serde(default)]
    pub usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum AssistantContent {
    Text {
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    RedactedThinking {},
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub(crate) struct ClaudeUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SummaryRecord {
    pub summary: String,
    #[serde(default)]
    pub leaf_uuid: Option<String>,
}
