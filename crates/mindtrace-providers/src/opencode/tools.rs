use serde_json::{Map, Value};

/// Canonical tool name for an OpenCode tool id
pub fn canonical_tool_name(tool: &str) -> String {
    match tool {
        "bash" => "Bash",
        "read" => "Read",
        "edit" => "Edit",
        "multiedit" => "MultiEdit",
        "write" => "Write",
        "glob" => "Glob",
        "grep" => "Grep",
        "list" => "LS",
        "webfetch" => "WebFetch",
        "websearch" => "WebSearch",
        "task" => "Task",
        "todowrite" => "TodoWrite",
        "todoread" => "TodoRead",
        "patch" => "Edit",
        other => return other.to_string(),
    }
    .to_string()
}

/// Tool input with camelCase keys rewritten to snake_case (`filePath` -> `file_path`)
pub fn canonical_input(input: &Value) -> Value {
    match input {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (snake_case(key), value.clone()))
                .collect::<Map<String, Value>>(),
        ),
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    }
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rendered result of a finished tool part
pub fn result_text(output: Option<&Value>, error: Option<&str>) -> String {
    if let Some(error) = error {
        return error.to_string();
    }
    match output {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
