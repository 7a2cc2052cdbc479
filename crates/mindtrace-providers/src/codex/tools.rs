use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

/// "Exit code: 1" (older text output) or "Process exited with code 1" (newer)
static EXIT_CODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:exit code:|exited with code)\s*(-?\d+)").expect("valid exit code regex")
});

const SHELLS: &[&str] = &["bash", "zsh", "sh"];

/// Result side of a finished call
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CallOutcome {
    pub output: String,
    pub is_error: bool,
    pub duration_ms: Option<u64>,
}

/// Parse a function call's JSON argument string, keeping unparseable text
pub(crate) fn parse_json_arguments(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(arguments).unwrap_or_else(|_| json!({ "raw": arguments }))
}

/// Flatten an argv into the command line a user would have typed
///
/// `["bash", "-lc", "ls -la"]` becomes `ls -la`; other argvs are space-joined.
pub(crate) fn command_string(command: &Value) -> String {
    match command {
        Value::String(s) => s.clone(),
        Value::Array(parts) => {
            let parts: Vec<&str> = parts.iter().filter_map(|p| p.as_str()).collect();
            let is_wrapper = parts.len() >= 3
                && SHELLS.contains(&shell_name(parts[0]))
                && matches!(parts[1], "-lc" | "-c");
            if is_wrapper {
                parts[2..].join(" ")
            } else {
                parts.join(" ")
            }
        }
        _ => String::new(),
    }
}

fn shell_name(program: &str) -> &str {
    program.rsplit('/').next().unwrap_or(program)
}

/// Files touched by an apply_patch body, in order of appearance
pub(crate) fn patch_files(patch: &str) -> Vec<String> {
    patch
        .lines()
        .filter_map(|line| {
            ["*** Add File: ", "*** Update File: ", "*** Delete File: "]
                .iter()
                .find_map(|prefix| line.strip_prefix(prefix))
        })
        .map(|path| path.trim().to_string())
        .collect()
}

/// Added and removed lines of a patch body (hunk headers excluded)
pub(crate) fn patch_line_counts(patch: &str) -> (u64, u64) {
    patch.lines().fold((0, 0), |(add, del), line| {
        if line.starts_with("***") || line.starts_with("+++") || line.starts_with("---") {
            (add, del)
        } else if line.starts_with('+') {
            (add + 1, del)
        } else if line.starts_with('-') {
            (add, del + 1)
        } else {
            (add, del)
        }
    })
}

fn edit_input(patch: &str) -> Value {
    let files = patch_files(patch);
    let (additions, deletions) = patch_line_counts(patch);
    json!({
        "file_path": files.first().cloned().unwrap_or_default(),
        "file_paths": files,
        "additions": additions,
        "deletions": deletions,
    })
}

/// Map a native Codex tool call onto its canonical name and input shape
pub(crate) fn canonical_call(name: &str, args: Value) -> (String, Value) {
    match name {
        "shell" | "shell_command" | "container.exec" | "exec_command" | "local_shell" => {
            let command = args
                .get("command")
                .or_else(|| args.get("cmd"))
                .map(command_string)
                .unwrap_or_default();
            let mut input = Map::new();
            input.insert("command".into(), Value::String(command));
            if let Some(dir) = args.get("workdir").or_else(|| args.get("working_directory")) {
                input.insert("cwd".into(), dir.clone());
            }
            ("Bash".to_string(), Value::Object(input))
        }
        "apply_patch" => {
            let patch = match &args {
                Value::String(s) => s.clone(),
                other => other
                    .get("input")
                    .or_else(|| other.get("patch"))
                    .or_else(|| other.get("raw"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            };
            ("Edit".to_string(), edit_input(&patch))
        }
        "update_plan" => {
            let todos: Vec<Value> = args
                .get("plan")
                .and_then(|p| p.as_array())
                .map(|steps| {
                    steps
                        .iter()
                        .map(|s| {
                            let step = s.get("step").and_then(|v| v.as_str()).unwrap_or_default();
                            let status =
                                s.get("status").and_then(|v| v.as_str()).unwrap_or("pending");
                            json!({ "content": step, "status": status })
                        })
                        .collect()
                })
                .unwrap_or_default();
            ("TodoWrite".to_string(), json!({ "todos": todos }))
        }
        "web_search" => {
            let query = args.get("query").cloned().unwrap_or(Value::String(String::new()));
            ("WebSearch".to_string(), json!({ "query": query }))
        }
        "view_image" => {
            let path = args.get("path").cloned().unwrap_or(Value::String(String::new()));
            ("Read".to_string(), json!({ "file_path": path }))
        }
        other => (other.to_string(), args),
    }
}

/// Input for a patch announced by `patch_apply_begin`
pub(crate) fn patch_changes_input(changes: &Map<String, Value>) -> Value {
    let files: Vec<String> = changes.keys().cloned().collect();
    let (additions, deletions) = changes.values().fold((0, 0), |(add, del), change| {
        let diff = change
            .get("update")
            .and_then(|u| u.get("unified_diff"))
            .and_then(|d| d.as_str());
        let content = change
            .get("add")
            .and_then(|a| a.get("content"))
            .and_then(|c| c.as_str());
        match (diff, content) {
            (Some(diff), _) => {
                let (a, d) = patch_line_counts(diff);
                (add + a, del + d)
            }
            (None, Some(content)) => (add + content.lines().count() as u64, del),
            _ => (add, del),
        }
    });
    json!({
        "file_path": files.first().cloned().unwrap_or_default(),
        "file_paths": files,
        "additions": additions,
        "deletions": deletions,
    })
}

pub(crate) fn mcp_tool_name(server: &str, tool: &str) -> String {
    format!("mcp__{}__{}", server, tool)
}

/// `{"secs": 1, "nanos": 500000000}` or fractional seconds
pub(crate) fn duration_ms(value: &Value) -> Option<u64> {
    match value {
        Value::Object(map) => {
            let secs = map.get("secs").and_then(|v| v.as_u64())?;
            let nanos = map.get("nanos").and_then(|v| v.as_u64()).unwrap_or(0);
            Some(secs * 1000 + nanos / 1_000_000)
        }
        Value::Number(n) => n.as_f64().map(|s| (s * 1000.0).round() as u64),
        _ => None,
    }
}

pub(crate) fn exit_code_in(text: &str) -> Option<i64> {
    EXIT_CODE_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Output of `function_call_output` / `custom_tool_call_output`
///
/// Either a JSON string `{"output": .., "metadata": {"exit_code", "duration_seconds"}}`,
/// an object `{"content": .., "success": ..}`, or plain text with an exit-code line.
pub(crate) fn parse_call_output(output: &Value) -> CallOutcome {
    match output {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(obj)) if obj.contains_key("output") => {
                let metadata = obj.get("metadata");
                let exit_code = metadata.and_then(|m| m.get("exit_code")).and_then(|c| c.as_i64());
                let output = obj.get("output").and_then(|o| o.as_str()).unwrap_or_default();
                CallOutcome {
                    output: output.to_string(),
                    is_error: exit_code.is_some_and(|c| c != 0),
                    duration_ms: metadata
                        .and_then(|m| m.get("duration_seconds"))
                        .and_then(duration_ms),
                }
            }
            _ => CallOutcome {
                output: text.clone(),
                is_error: exit_code_in(text).is_some_and(|c| c != 0),
                duration_ms: None,
            },
        },
        Value::Object(obj) => {
            let content = match obj.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            let failed = obj.get("success").and_then(|s| s.as_bool()) == Some(false);
            CallOutcome {
                is_error: failed || exit_code_in(&content).is_some_and(|c| c != 0),
                output: content,
                duration_ms: None,
            }
        }
        Value::Null => CallOutcome::default(),
        other => CallOutcome {
            output: other.to_string(),
            ..CallOutcome::default()
        },
    }
}

/// `{"Ok": {"content": [..], "isError": ..}}` or `{"Err": ".."}`
pub(crate) fn parse_mcp_result(result: &Value, duration: Option<&Value>) -> CallOutcome {
    let duration_ms = duration.and_then(duration_ms);
    if let Some(err) = result.get("Err") {
        return CallOutcome {
            output: err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string()),
            is_error: true,
            duration_ms,
        };
    }
    let ok = result.get("Ok").unwrap_or(result);
    let output = ok
        .get("content")
        .and_then(|c| c.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    CallOutcome {
        output,
        is_error: ok.get("isError").and_then(|e| e.as_bool()).unwrap_or(false),
        duration_ms,
    }
}
