use anyhow::Result;
use mindtrace_providers::claude::encode_project_dir;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use super::write_jsonl;

/// `~/.claude/projects` replacement rooted in a temp dir
pub struct ClaudeFixture {
    root: PathBuf,
}

impl ClaudeFixture {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, workspace: &Path) -> PathBuf {
        self.root.join(encode_project_dir(workspace))
    }

    pub fn write_session(
        &self,
        workspace: &Path,
        session_id: &str,
        lines: &[String],
    ) -> Result<PathBuf> {
        let path = self.project_dir(workspace).join(format!("{}.jsonl", session_id));
        write_jsonl(&path, lines)?;
        Ok(path)
    }

    /// `<project>/<session>/subagents/agent-<id>.jsonl`
    pub fn write_subagent(
        &self,
        workspace: &Path,
        session_id: &str,
        agent_id: &str,
        lines: &[String],
    ) -> Result<PathBuf> {
        let path = self
            .project_dir(workspace)
            .join(session_id)
            .join("subagents")
            .join(format!("agent-{}.jsonl", agent_id));
        write_jsonl(&path, lines)?;
        Ok(path)
    }
}

pub fn user(uuid: &str, session_id: &str, ts: &str, cwd: &Path, text: &str) -> String {
    json!({
        "type": "user",
        "uuid": uuid,
        "parentUuid": null,
        "sessionId": session_id,
        "timestamp": ts,
        "cwd": cwd,
        "message": {"role": "user", "content": text}
    })
    .to_string()
}

pub fn assistant(uuid: &str, session_id: &str, ts: &str, content: Value) -> String {
    json!({
        "type": "assistant",
        "uuid": uuid,
        "sessionId": session_id,
        "timestamp": ts,
        "message": {
            "id": format!("msg_{}", uuid),
            "model": "claude-sonnet-4-5-20250929",
            "role": "assistant",
            "content": content,
            "usage": {"input_tokens": 10, "output_tokens": 5, "cache_read_input_tokens": 100}
        }
    })
    .to_string()
}

pub fn tool_use(
    uuid: &str,
    session_id: &str,
    ts: &str,
    call_id: &str,
    name: &str,
    input: Value,
) -> String {
    let content = json!([{"type": "tool_use", "id": call_id, "name": name, "input": input}]);
    assistant(uuid, session_id, ts, content)
}

pub fn tool_result(
    uuid: &str,
    session_id: &str,
    ts: &str,
    call_id: &str,
    output: &str,
    extra: Value,
) -> String {
    let mut record = json!({
        "type": "user",
        "uuid": uuid,
        "sessionId": session_id,
        "timestamp": ts,
        "message": {
            "role": "user",
            "content": [{"type": "tool_result", "tool_use_id": call_id, "content": output}]
        }
    });
    if !extra.is_null() {
        record["toolUseResult"] = extra;
    }
    record.to_string()
}

pub fn summary(text: &str, leaf: &str) -> String {
    json!({"type": "summary", "summary": text, "leafUuid": leaf}).to_string()
}
