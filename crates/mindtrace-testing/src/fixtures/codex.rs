use anyhow::Result;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use super::write_jsonl;

/// `~/.codex` replacement rooted in a temp dir
pub struct CodexFixture {
    root: PathBuf,
}

impl CodexFixture {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `sessions/<day>/rollout-<stamp>-<id>.jsonl`; `day` is `YYYY/MM/DD`
    pub fn write_rollout(
        &self,
        day: &str,
        stamp: &str,
        session_id: &str,
        lines: &[String],
    ) -> Result<PathBuf> {
        let path = self
            .root
            .join("sessions")
            .join(day)
            .join(format!("rollout-{}-{}.jsonl", stamp, session_id));
        write_jsonl(&path, lines)?;
        Ok(path)
    }

    /// `state.sqlite` with a `threads` table
    pub fn write_index(&self, threads: &[(&str, &Path, &Path, i64)]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.root.join("state.sqlite");
        let conn = rusqlite::Connection::open(&path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                rollout_path TEXT NOT NULL,
                cwd TEXT,
                title TEXT,
                updated_at INTEGER NOT NULL
            );",
        )?;
        for (id, rollout, cwd, updated_at) in threads {
            conn.execute(
                "INSERT OR REPLACE INTO threads (id, rollout_path, cwd, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, rollout.to_string_lossy(), cwd.to_string_lossy(), updated_at],
            )?;
        }
        Ok(path)
    }
}

fn record(ts: &str, kind: &str, payload: Value) -> String {
    json!({"timestamp": ts, "type": kind, "payload": payload}).to_string()
}

pub fn session_meta(ts: &str, id: &str, cwd: &Path, source: Value) -> String {
    let mut payload = json!({"id": id, "timestamp": ts, "cwd": cwd, "cli_version": "0.46.0"});
    if !source.is_null() {
        payload["source"] = source;
    }
    record(ts, "session_meta", payload)
}

pub fn turn_context(ts: &str, cwd: &Path, model: &str) -> String {
    record(ts, "turn_context", json!({"cwd": cwd, "model": model, "approval_policy": "on-request"}))
}

pub fn user_message(ts: &str, text: &str) -> String {
    record(
        ts,
        "response_item",
        json!({
            "type": "message",
            "role": "user",
            "content": [{"type": "input_text", "text": text}]
        }),
    )
}

pub fn assistant_message(ts: &str, text: &str) -> String {
    record(
        ts,
        "response_item",
        json!({
            "type": "message",
            "role": "assistant",
            "content": [{"type": "output_text", "text": text}]
        }),
    )
}

pub fn function_call(ts: &str, call_id: &str, name: &str, arguments: Value) -> String {
    record(
        ts,
        "response_item",
        json!({
            "type": "function_call",
            "name": name,
            "arguments": arguments.to_string(),
            "call_id": call_id
        }),
    )
}

pub fn function_call_output(ts: &str, call_id: &str, output: &str) -> String {
    record(
        ts,
        "response_item",
        json!({"type": "function_call_output", "call_id": call_id, "output": output}),
    )
}

pub fn exec_begin(ts: &str, call_id: &str, command: &[&str]) -> String {
    record(
        ts,
        "event_msg",
        json!({"type": "exec_command_begin", "call_id": call_id, "command": command}),
    )
}

pub fn exec_end(ts: &str, call_id: &str, exit_code: i64, stdout: &str) -> String {
    record(
        ts,
        "event_msg",
        json!({
            "type": "exec_command_end",
            "call_id": call_id,
            "exit_code": exit_code,
            "stdout": stdout,
            "stderr": ""
        }),
    )
}

pub fn token_count(ts: &str, input: u64, output: u64, context_window: Option<u64>) -> String {
    let mut info = json!({
        "last_token_usage": {
            "input_tokens": input,
            "cached_input_tokens": 0,
            "output_tokens": output,
            "reasoning_output_tokens": 0
        }
    });
    if let Some(window) = context_window {
        info["model_context_window"] = json!(window);
    }
    record(ts, "event_msg", json!({"type": "token_count", "info": info}))
}

pub fn entered_review_mode(ts: &str) -> String {
    record(ts, "event_msg", json!({"type": "entered_review_mode"}))
}
