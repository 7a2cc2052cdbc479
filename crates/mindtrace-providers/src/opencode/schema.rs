use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// `storage/session/<project>/<id>.json`
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct SessionFile {
    pub id: String,
    #[serde(default, rename = "projectID")]
    pub project_id: Option<String>,
    #[serde(default, rename = "parentID")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub time: Option<SessionTime>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub(crate) struct SessionTime {
    #[serde(default)]
    pub updated: Option<i64>,
}

/// Message metadata; the `data` column or a `message/<session>/<id>.json` file
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MessageInfo {
    /// Absent from the `data` column, filled in from the row id
    #[serde(default)]
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub time: MessageTime,
    #[serde(default, rename = "modelID")]
    pub model_id: Option<String>,
    #[serde(default, rename = "providerID")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub tokens: Option<MessageTokens>,
    /// `true` on compaction summaries; an object on newer user messages
    #[serde(default)]
    pub summary: Option<Value>,
    #[serde(default, rename = "parentID")]
    pub parent_id: Option<String>,
}

impl MessageInfo {
    pub fn created_at(&self) -> DateTime<Utc> {
        millis_to_datetime(self.time.created)
    }

    pub fn is_compaction(&self) -> bool {
        matches!(self.summary, Some(Value::Bool(true)))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageTime {
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub completed: Option<i64>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageTokens {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub reasoning: u64,
    #[serde(default)]
    pub cache: CacheTokens,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheTokens {
    #[serde(default)]
    pub read: u64,
    #[serde(default)]
    pub write: u64,
}

/// One part of a message; parts arrive unordered and are folded by `index`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Part {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(flatten)]
    pub kind: PartKind,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PartKind {
    Text {
        #[serde(default)]
        text: String,
        #[serde(default)]
        synthetic: bool,
    },
    Reasoning {
        #[serde(default)]
        text: String,
    },
    File {
        #[serde(default)]
        mime: String,
        #[serde(default)]
        filename: Option<String>,
    },
    Tool {
        #[serde(rename = "callID")]
        call_id: String,
        tool: String,
        #[serde(default)]
        state: ToolState,
    },
    Compaction {},
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ToolState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub time: Option<ToolTime>,
}

impl ToolState {
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "error")
    }

    pub fn duration_ms(&self) -> Option<u64> {
        let time = self.time?;
        let (start, end) = (time.start?, time.end?);
        (end >= start).then(|| (end - start) as u64)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolTime {
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

pub(crate) fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_part() {
        let part: Part = serde_json::from_str(
            r#"{"id":"prt_1","type":"tool","callID":"c1","tool":"bash",
                "state":{"status":"completed","input":{"command":"ls"},"output":"a.txt",
                         "time":{"start":1000,"end":1250}}}"#,
        )
        .unwrap();
        match part.kind {
            PartKind::Tool { call_id, tool, state } => {
                assert_eq!(call_id, "c1");
                assert_eq!(tool, "bash");
                assert!(state.is_finished());
                assert_eq!(state.duration_ms(), Some(250));
            }
            other => panic!("Expected Tool, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_part_kind() {
        let part: Part =
            serde_json::from_str(r#"{"id":"p","type":"step-start","snapshot":"abc"}"#).unwrap();
        assert_eq!(part.kind, PartKind::Unknown);
    }

    #[test]
    fn test_compaction_flag() {
        let flagged = r#"{"role":"assistant","summary":true,"time":{"created":5}}"#;
        let info: MessageInfo = serde_json::from_str(flagged).unwrap();
        assert!(info.is_compaction());
        let titled = r#"{"role":"user","summary":{"title":"x"},"time":{"created":5}}"#;
        let info: MessageInfo = serde_json::from_str(titled).unwrap();
        assert!(!info.is_compaction());
    }
}
