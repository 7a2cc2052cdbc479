//! Per-tool natural-key extraction.
//!
//! Each canonical tool name has one rule that pulls the entities it touched
//! out of its input. Tools without a rule produce nothing beyond their own
//! tool node.

use mindtrace_types::NodeType;
use serde_json::Value;

/// An entity a tool call touched, keyed by its natural key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Product {
    File(String),
    Url(String),
    Directory(String),
    Command(String),
}

impl Product {
    pub fn node_type(&self) -> NodeType {
        match self {
            Product::File(_) => NodeType::File,
            Product::Url(_) => NodeType::Url,
            Product::Directory(_) => NodeType::Directory,
            Product::Command(_) => NodeType::Command,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Product::File(k) | Product::Url(k) | Product::Directory(k) | Product::Command(k) => k,
        }
    }

    /// Files and URLs are what the "latest activity" highlight points at
    pub fn is_highlightable(&self) -> bool {
        matches!(self, Product::File(_) | Product::Url(_))
    }
}

const FILE_TOOLS: &[&str] = &["Read", "Edit", "MultiEdit", "Write", "NotebookEdit", "NotebookRead"];
const SEARCH_TOOLS: &[&str] = &["Glob", "Grep"];

/// Tools that manage the task list itself rather than doing work
pub const TASK_TOOLS: &[&str] = &[
    "TaskCreate",
    "TaskUpdate",
    "TaskGet",
    "TaskList",
    "TodoWrite",
    "TodoRead",
];

pub fn is_task_tool(name: &str) -> bool {
    TASK_TOOLS.contains(&name)
}

/// Entities touched by one call, in input order, without duplicates
pub fn products(name: &str, input: &Value) -> Vec<Product> {
    let mut out = Vec::new();
    let mut push = |product: Product| {
        if !product.key().is_empty() && !out.contains(&product) {
            out.push(product);
        }
    };

    match name {
        n if FILE_TOOLS.contains(&n) => {
            for path in file_paths(input) {
                push(Product::File(path));
            }
        }
        "LS" => {
            if let Some(path) = str_field(input, "path") {
                push(Product::Directory(path));
            }
        }
        n if SEARCH_TOOLS.contains(&n) => {
            if let Some(path) = str_field(input, "path") {
                push(Product::Directory(path));
            }
        }
        "WebFetch" => {
            if let Some(url) = str_field(input, "url") {
                push(Product::Url(url));
            }
        }
        "WebSearch" => {
            if let Some(query) = str_field(input, "query") {
                push(Product::Url(format!("search: {}", query.trim())));
            }
        }
        "Bash" => {
            if let Some(family) = str_field(input, "command").as_deref().and_then(command_family) {
                push(Product::Command(family));
            }
        }
        _ => {}
    }
    out
}

/// `file_path` / `notebook_path` / `path`, plus every entry of `file_paths`
fn file_paths(input: &Value) -> Vec<String> {
    let mut paths: Vec<String> = ["file_path", "notebook_path", "path"]
        .iter()
        .find_map(|key| str_field(input, key))
        .into_iter()
        .collect();
    if let Some(list) = input.get("file_paths").and_then(Value::as_array) {
        paths.extend(list.iter().filter_map(Value::as_str).map(str::to_string));
    }
    paths
}

/// Program name of the first real command in a shell line
///
/// `cd dir && cargo test` -> `cargo`, `FOO=1 sudo /usr/bin/make all` -> `make`.
pub fn command_family(command: &str) -> Option<String> {
    command
        .split(['&', ';', '|', '\n'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            segment
                .split_whitespace()
                .find(|word| !word.contains('=') && *word != "sudo" && *word != "env")
        })
        .find(|program| *program != "cd")
        .map(|program| program.rsplit('/').next().unwrap_or(program).to_string())
        .filter(|program| !program.is_empty())
}

/// Lines added and removed by an editing call
///
/// Explicit `additions` / `deletions` counts win; otherwise they are derived
/// from the edit's old and new text.
pub fn line_changes(name: &str, input: &Value) -> (u32, u32) {
    let explicit = |key: &str| input.get(key).and_then(Value::as_u64).map(|n| n as u32);
    if let (Some(add), Some(del)) = (explicit("additions"), explicit("deletions")) {
        return (add, del);
    }

    match name {
        "Write" => (count_lines(input.get("content")), 0),
        "Edit" => edit_counts(input),
        "MultiEdit" => input
            .get("edits")
            .and_then(Value::as_array)
            .map(|edits| {
                edits.iter().map(edit_counts).fold((0, 0), |(a, d), (ea, ed)| (a + ea, d + ed))
            })
            .unwrap_or_default(),
        "NotebookEdit" => (count_lines(input.get("new_source")), 0),
        _ => (0, 0),
    }
}

fn edit_counts(edit: &Value) -> (u32, u32) {
    (count_lines(edit.get("new_string")), count_lines(edit.get("old_string")))
}

fn count_lines(value: Option<&Value>) -> u32 {
    value
        .and_then(Value::as_str)
        .map(|s| s.lines().count() as u32)
        .unwrap_or(0)
}

pub(crate) fn str_field(input: &Value, key: &str) -> Option<String> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_family() {
        assert_eq!(command_family("cargo test --all").as_deref(), Some("cargo"));
        assert_eq!(command_family("cd crates/app && npm run build").as_deref(), Some("npm"));
        assert_eq!(
            command_family("RUST_LOG=debug sudo /usr/bin/make all").as_deref(),
            Some("make")
        );
        assert_eq!(command_family("   "), None);
        assert_eq!(command_family("cd /tmp"), None);
    }

    #[test]
    fn test_file_products_include_patch_file_list() {
        let input = json!({"file_path": "src/a.rs", "file_paths": ["src/a.rs", "src/b.rs"]});
        assert_eq!(
            products("Edit", &input),
            vec![Product::File("src/a.rs".into()), Product::File("src/b.rs".into())]
        );
    }

    #[test]
    fn test_unlisted_tool_produces_nothing() {
        assert!(products("mcp__docs__search", &json!({"path": "/x"})).is_empty());
        assert!(products("Glob", &json!({"pattern": "**/*.rs"})).is_empty());
    }

    #[test]
    fn test_line_changes() {
        let edit = json!({"file_path": "a", "old_string": "x\ny", "new_string": "x\ny\nz"});
        assert_eq!(line_changes("Edit", &edit), (3, 2));
        assert_eq!(line_changes("Write", &json!({"content": "1\n2\n3\n4"})), (4, 0));
        let multi = json!({"edits": [
            {"old_string": "a", "new_string": "b\nc"},
            {"old_string": "", "new_string": "d"}
        ]});
        assert_eq!(line_changes("MultiEdit", &multi), (3, 1));
        assert_eq!(line_changes("Edit", &json!({"additions": 7, "deletions": 2})), (7, 2));
        assert_eq!(line_changes("Read", &json!({"file_path": "a"})), (0, 0));
    }
}
