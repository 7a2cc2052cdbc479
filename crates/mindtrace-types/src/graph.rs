use serde::{Deserialize, Serialize};

/// Kind of entity a graph node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Session,
    Tool,
    File,
    Url,
    Directory,
    Command,
    Task,
    Todo,
    Fork,
}

impl NodeType {
    /// Id prefix; node ids are `<prefix>:<natural key>`
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeType::Session => "session",
            NodeType::Tool => "tool",
            NodeType::File => "file",
            NodeType::Url => "url",
            NodeType::Directory => "dir",
            NodeType::Command => "cmd",
            NodeType::Task => "task",
            NodeType::Todo => "todo",
            NodeType::Fork => "fork",
        }
    }
}

/// Collapsed task status shown on task nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Collapse a provider status string; anything unrecognised is pending
    pub fn collapse(raw: &str) -> Self {
        match raw {
            "in_progress" | "in-progress" | "active" | "running" => TaskStatus::InProgress,
            "completed" | "done" | "complete" => TaskStatus::Completed,
            _ => TaskStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// root -> tool, root -> task/todo/fork
    Contains,
    /// tool -> file/url/directory/command
    Produces,
    /// task -> tool/file touched while the task was active
    Action,
    /// blocking task -> blocked task
    Dependency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_status: Option<TaskStatus>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            count: None,
            additions: None,
            deletions: None,
            task_status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_latest: Option<bool>,
}

impl GraphLink {
    pub fn new(source: impl Into<String>, target: impl Into<String>, link_type: LinkType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            link_type: Some(link_type),
            is_latest: None,
        }
    }
}

/// Node/link graph rebuilt from accumulated session statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MindMapGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl MindMapGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn latest_link(&self) -> Option<&GraphLink> {
        self.links.iter().find(|l| l.is_latest == Some(true))
    }

    pub fn links_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a GraphLink> + 'a {
        self.links.iter().filter(move |l| l.source == source)
    }
}
