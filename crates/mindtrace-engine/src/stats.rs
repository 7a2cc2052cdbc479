use chrono::{DateTime, Utc};
use mindtrace_types::{TaskStatus, TokenUsage};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::extract::{Product, line_changes, products, str_field};

static CREATED_TASK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Task #(\w+)").expect("valid task id regex"));

/// One tool invocation with its outcome, if known
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolCall {
    pub fn is_finished(&self) -> bool {
        self.output.is_some()
    }

    pub fn products(&self) -> Vec<Product> {
        products(&self.name, &self.input)
    }
}

/// Per-file touch count and line delta
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub touches: u32,
    pub additions: u32,
    pub deletions: u32,
}

impl FileChange {
    pub fn is_modified(&self) -> bool {
        self.additions > 0 || self.deletions > 0
    }
}

/// A task from the assistant's task list (`TaskCreate` / `TaskUpdate`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedTask {
    pub id: String,
    pub subject: String,
    /// Status as last reported by the provider
    pub status: String,
    /// Ids of tasks that must finish before this one
    pub blocked_by: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TrackedTask {
    pub fn collapsed_status(&self) -> TaskStatus {
        TaskStatus::collapse(&self.status)
    }

    /// Whether work at `at` happened while this task was in progress
    pub fn was_active_at(&self, at: DateTime<Utc>) -> bool {
        self.started_at.is_some_and(|start| at >= start)
            && self.finished_at.is_none_or(|end| at < end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoItem {
    pub content: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForkStats {
    pub id: String,
    pub agent_type: Option<String>,
    pub description: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub files: Vec<FileChange>,
}

impl ForkStats {
    pub fn label(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.agent_type.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Aggregate of one session, the graph builder's only input
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub model: Option<String>,
    /// Sum of the last usage reported per message
    pub usage: TokenUsage,
    pub message_count: usize,
    /// Main-session tool calls in first-seen order
    pub tool_calls: Vec<ToolCall>,
    pub files: Vec<FileChange>,
    pub tasks: Vec<TrackedTask>,
    /// Latest todo list written by the assistant
    pub todos: Vec<TodoItem>,
    pub forks: Vec<ForkStats>,
}

impl SessionStats {
    pub fn file(&self, path: &str) -> Option<&FileChange> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn task(&self, id: &str) -> Option<&TrackedTask> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// Files touched by `calls`, in first-touch order
pub fn file_changes(calls: &[ToolCall]) -> Vec<FileChange> {
    let mut files: Vec<FileChange> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for call in calls {
        let touched: Vec<String> = call
            .products()
            .into_iter()
            .filter_map(|p| match p {
                Product::File(path) => Some(path),
                _ => None,
            })
            .collect();
        if touched.is_empty() {
            continue;
        }
        // Failed edits changed nothing; multi-file deltas go to the first file
        let (additions, deletions) = if call.is_error {
            (0, 0)
        } else {
            line_changes(&call.name, &call.input)
        };

        for (i, path) in touched.into_iter().enumerate() {
            let slot = *index.entry(path.clone()).or_insert_with(|| {
                files.push(FileChange {
                    path,
                    ..Default::default()
                });
                files.len() - 1
            });
            let file = &mut files[slot];
            file.touches += 1;
            if i == 0 {
                file.additions += additions;
                file.deletions += deletions;
            }
        }
    }
    files
}

/// Task list reconstructed from `TaskCreate` / `TaskUpdate` calls
///
/// Created tasks take the id reported in the call's result (`Task #N`), else
/// their creation ordinal. Updates to unknown ids are ignored.
pub fn tracked_tasks(calls: &[ToolCall]) -> Vec<TrackedTask> {
    let mut tasks: Vec<TrackedTask> = Vec::new();
    let mut created = 0usize;

    for call in calls {
        match call.name.as_str() {
            "TaskCreate" => {
                created += 1;
                let id = call
                    .output
                    .as_deref()
                    .and_then(|out| CREATED_TASK_REGEX.captures(out))
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| created.to_string());
                let subject = str_field(&call.input, "subject")
                    .or_else(|| str_field(&call.input, "description"))
                    .unwrap_or_else(|| format!("Task {}", id));
                match tasks.iter_mut().find(|t| t.id == id) {
                    Some(task) => task.subject = subject,
                    None => tasks.push(TrackedTask {
                        id,
                        subject,
                        status: "pending".to_string(),
                        blocked_by: Vec::new(),
                        started_at: None,
                        finished_at: None,
                    }),
                }
            }
            "TaskUpdate" => {
                let Some(id) = id_field(&call.input, "taskId") else {
                    continue;
                };
                let Some(pos) = tasks.iter().position(|t| t.id == id) else {
                    continue;
                };

                let task = &mut tasks[pos];
                if let Some(subject) = str_field(&call.input, "subject") {
                    task.subject = subject;
                }
                if let Some(status) = str_field(&call.input, "status") {
                    match TaskStatus::collapse(&status) {
                        TaskStatus::InProgress => {
                            task.started_at.get_or_insert(call.timestamp);
                            task.finished_at = None;
                        }
                        _ if task.started_at.is_some() && task.finished_at.is_none() => {
                            task.finished_at = Some(call.timestamp);
                        }
                        _ => {}
                    }
                    task.status = status;
                }
                for blocker in id_list(&call.input, "addBlockedBy") {
                    add_unique(&mut tasks[pos].blocked_by, blocker);
                }
                for blocked in id_list(&call.input, "addBlocks") {
                    if let Some(other) = tasks.iter_mut().find(|t| t.id == blocked) {
                        add_unique(&mut other.blocked_by, id.clone());
                    }
                }
            }
            _ => {}
        }
    }
    tasks
}

/// The last todo list written (`TodoWrite`), empty when none
pub fn latest_todos(calls: &[ToolCall]) -> Vec<TodoItem> {
    calls
        .iter()
        .rev()
        .filter(|c| c.name == "TodoWrite")
        .find_map(|c| c.input.get("todos").and_then(Value::as_array))
        .map(|todos| {
            todos
                .iter()
                .filter_map(|todo| {
                    Some(TodoItem {
                        content: str_field(todo, "content")?,
                        status: str_field(todo, "status").unwrap_or_else(|| "pending".to_string()),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn id_field(input: &Value, key: &str) -> Option<String> {
    match input.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_list(input: &Value, key: &str) -> Vec<String> {
    match input.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(_) => id_field(input, key).into_iter().collect(),
        None => Vec::new(),
    }
}

fn add_unique(list: &mut Vec<String>, id: String) {
    if !list.contains(&id) {
        list.push(id);
    }
}
