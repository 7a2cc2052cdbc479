//! Mind-map graph construction.
//!
//! The graph is rebuilt from scratch from a `SessionStats` snapshot on every
//! call. Node ids are `<kind prefix>:<natural key>`; nodes inside a fork's
//! subtree are additionally namespaced as `fork:<fork id>/<kind>:<key>`, so the
//! same statistics always produce the same ids and forks never collide.
//!
//! Layout:
//! - root (session) -> tool, task, todo and fork nodes
//! - tool -> file / url / directory / command nodes it produced
//! - task -> tool / file touched while the task was in progress (action)
//! - blocking task -> blocked task (dependency)

use mindtrace_types::{
    GraphLink, GraphNode, LinkType, MindMapGraph, NodeType, TaskStatus, file_label, truncate,
};
use std::collections::{HashMap, HashSet};

use crate::extract::{Product, is_task_tool};
use crate::stats::{FileChange, SessionStats, ToolCall};

const LABEL_MAX_CHARS: usize = 60;

/// Build the graph for one session
pub fn build_graph(stats: &SessionStats) -> MindMapGraph {
    let mut graph = Assembly::default();

    let root = node_id("", NodeType::Session, &stats.session_id);
    let short: String = stats.session_id.chars().take(8).collect();
    graph.node(GraphNode::new(&root, format!("session {}", short), NodeType::Session));

    let latest = latest_highlight(&stats.tool_calls);
    graph.attach_calls("", &root, &stats.tool_calls, &stats.files, latest);

    for task in &stats.tasks {
        let id = node_id("", NodeType::Task, &task.id);
        let label = truncate(&task.subject, LABEL_MAX_CHARS);
        let mut node = GraphNode::new(&id, label, NodeType::Task);
        node.task_status = Some(task.collapsed_status());
        graph.node(node);
        graph.link(&root, &id, LinkType::Contains);
    }
    for task in &stats.tasks {
        let id = node_id("", NodeType::Task, &task.id);
        for blocker in &task.blocked_by {
            if stats.task(blocker).is_some() {
                graph.link(&node_id("", NodeType::Task, blocker), &id, LinkType::Dependency);
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        for call in stats.tool_calls.iter().filter(|c| !is_task_tool(&c.name)) {
            if !task.was_active_at(call.timestamp) {
                continue;
            }
            let tool = node_id("", NodeType::Tool, &call.name);
            if seen.insert(tool.clone()) {
                graph.link(&id, &tool, LinkType::Action);
            }
            for product in call.products() {
                if let Product::File(path) = &product {
                    let file = node_id("", NodeType::File, path);
                    if seen.insert(file.clone()) {
                        graph.link(&id, &file, LinkType::Action);
                    }
                }
            }
        }
    }

    for todo in &stats.todos {
        let id = node_id("", NodeType::Todo, &todo.content);
        let label = truncate(&todo.content, LABEL_MAX_CHARS);
        let mut node = GraphNode::new(&id, label, NodeType::Todo);
        node.task_status = Some(TaskStatus::collapse(&todo.status));
        graph.node(node);
        graph.link(&root, &id, LinkType::Contains);
    }

    for fork in &stats.forks {
        let id = node_id("", NodeType::Fork, &fork.id);
        let label = truncate(&fork.label(), LABEL_MAX_CHARS);
        let mut node = GraphNode::new(&id, label, NodeType::Fork);
        node.count = Some(fork.tool_calls.len() as u32);
        graph.node(node);
        graph.link(&root, &id, LinkType::Contains);
        graph.attach_calls(&format!("{}/", id), &id, &fork.tool_calls, &fork.files, None);
    }

    graph.finish()
}

fn node_id(scope: &str, node_type: NodeType, key: &str) -> String {
    format!("{}{}:{}", scope, node_type.prefix(), key)
}

fn product_label(product: &Product) -> String {
    match product {
        Product::File(path) | Product::Directory(path) => file_label(path),
        Product::Url(key) | Product::Command(key) => truncate(key, LABEL_MAX_CHARS),
    }
}

/// Most recent call that touched a file or URL, and the first such product
fn latest_highlight(calls: &[ToolCall]) -> Option<(usize, Product)> {
    calls.iter().enumerate().rev().find_map(|(i, call)| {
        call.products()
            .into_iter()
            .find(Product::is_highlightable)
            .map(|product| (i, product))
    })
}

#[derive(Debug, Default)]
struct Assembly {
    nodes: Vec<GraphNode>,
    node_index: HashMap<String, usize>,
    links: Vec<GraphLink>,
    link_index: HashMap<(String, String, LinkType), usize>,
}

impl Assembly {
    /// Insert a node; an existing node with the same id is kept as is
    fn node(&mut self, node: GraphNode) -> usize {
        if let Some(&i) = self.node_index.get(&node.id) {
            return i;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Insert or bump the occurrence count of a node
    fn touch(&mut self, id: &str, label: String, node_type: NodeType) {
        let i = self.node(GraphNode::new(id, label, node_type));
        let count = self.nodes[i].count.get_or_insert(0);
        *count += 1;
    }

    fn link(&mut self, source: &str, target: &str, link_type: LinkType) -> usize {
        let key = (source.to_string(), target.to_string(), link_type);
        if let Some(&i) = self.link_index.get(&key) {
            return i;
        }
        self.link_index.insert(key, self.links.len());
        self.links.push(GraphLink::new(source, target, link_type));
        self.links.len() - 1
    }

    /// Tool nodes under `parent`, and the entities each tool produced under it
    fn attach_calls(
        &mut self,
        scope: &str,
        parent: &str,
        calls: &[ToolCall],
        files: &[FileChange],
        latest: Option<(usize, Product)>,
    ) {
        for (i, call) in calls.iter().enumerate() {
            let tool = node_id(scope, NodeType::Tool, &call.name);
            self.touch(&tool, call.name.clone(), NodeType::Tool);
            self.link(parent, &tool, LinkType::Contains);

            for product in call.products() {
                let id = node_id(scope, product.node_type(), product.key());
                self.touch(&id, product_label(&product), product.node_type());
                let link = self.link(&tool, &id, LinkType::Produces);
                if latest.as_ref().is_some_and(|(at, p)| *at == i && *p == product) {
                    self.links[link].is_latest = Some(true);
                }
            }
        }

        for file in files.iter().filter(|f| f.is_modified()) {
            let id = node_id(scope, NodeType::File, &file.path);
            if let Some(&i) = self.node_index.get(&id) {
                self.nodes[i].additions = Some(file.additions);
                self.nodes[i].deletions = Some(file.deletions);
            }
        }
    }

    fn finish(self) -> MindMapGraph {
        MindMapGraph {
            nodes: self.nodes,
            links: self.links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{TodoItem, TrackedTask};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{Value, json};

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, secs).unwrap()
    }

    fn call(id: &str, name: &str, secs: u32, input: Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input,
            timestamp: at(secs),
            output: Some("ok".to_string()),
            is_error: false,
            duration_ms: None,
        }
    }

    fn stats() -> SessionStats {
        let calls = vec![
            call("1", "Read", 1, json!({"file_path": "/w/src/lib.rs"})),
            call("2", "Read", 2, json!({"file_path": "/w/src/main.rs"})),
            call("3", "Bash", 3, json!({"command": "cargo test"})),
            call(
                "4",
                "Edit",
                4,
                json!({"file_path": "/w/src/lib.rs", "old_string": "a", "new_string": "a\nb"}),
            ),
            call("5", "Bash", 5, json!({"command": "cargo build"})),
        ];
        SessionStats {
            session_id: "abc12345-session".to_string(),
            files: crate::stats::file_changes(&calls),
            tool_calls: calls,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_root_and_two_tier_attachment() {
        let graph = build_graph(&stats());
        let roots: Vec<_> =
            graph.nodes.iter().filter(|n| n.node_type == NodeType::Session).collect();
        assert_eq!(roots.len(), 1);

        let root_targets: Vec<&str> =
            graph.links_from(&roots[0].id).map(|l| l.target.as_str()).collect();
        assert_eq!(root_targets, vec!["tool:Read", "tool:Bash", "tool:Edit"]);

        let read = graph.node("tool:Read").unwrap();
        assert_eq!(read.count, Some(2));
        let cargo = graph.node("cmd:cargo").unwrap();
        assert_eq!(cargo.count, Some(2));
        assert!(graph.links.iter().any(|l| l.source == "tool:Bash" && l.target == "cmd:cargo"));
    }

    #[test]
    fn test_exactly_one_latest_link() {
        let graph = build_graph(&stats());
        let latest: Vec<_> = graph.links.iter().filter(|l| l.is_latest == Some(true)).collect();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].source, "tool:Edit");
        assert_eq!(latest[0].target, "file:/w/src/lib.rs");
    }

    #[test]
    fn test_file_node_carries_line_delta() {
        let graph = build_graph(&stats());
        let lib = graph.node("file:/w/src/lib.rs").unwrap();
        assert_eq!((lib.count, lib.additions, lib.deletions), (Some(2), Some(2), Some(1)));
        assert_eq!(lib.label, "lib.rs");
        let main = graph.node("file:/w/src/main.rs").unwrap();
        assert_eq!(main.additions, None);
    }

    #[test]
    fn test_rebuild_is_identical() {
        let s = stats();
        assert_eq!(build_graph(&s), build_graph(&s));
    }

    #[test]
    fn test_task_edges_deduplicated() {
        let mut s = stats();
        s.tasks = vec![
            TrackedTask {
                id: "1".into(),
                subject: "Fix lib".into(),
                status: "in_progress".into(),
                blocked_by: vec![],
                started_at: Some(at(0)),
                finished_at: None,
            },
            TrackedTask {
                id: "2".into(),
                subject: "Release".into(),
                status: "blocked".into(),
                blocked_by: vec!["1".into(), "missing".into()],
                started_at: None,
                finished_at: None,
            },
        ];
        let graph = build_graph(&s);

        let actions: Vec<&str> = graph
            .links
            .iter()
            .filter(|l| l.link_type == Some(LinkType::Action))
            .map(|l| l.target.as_str())
            .collect();
        assert_eq!(
            actions,
            vec!["tool:Read", "file:/w/src/lib.rs", "file:/w/src/main.rs", "tool:Bash", "tool:Edit"]
        );

        let deps: Vec<_> = graph
            .links
            .iter()
            .filter(|l| l.link_type == Some(LinkType::Dependency))
            .collect();
        assert_eq!(deps.len(), 1);
        assert_eq!((deps[0].source.as_str(), deps[0].target.as_str()), ("task:1", "task:2"));
        assert_eq!(graph.node("task:2").unwrap().task_status, Some(TaskStatus::Pending));
        assert_eq!(graph.node("task:1").unwrap().task_status, Some(TaskStatus::InProgress));
    }

    #[test]
    fn test_forks_using_same_tool_do_not_collide() {
        let mut s = stats();
        for id in ["agent-a", "agent-b"] {
            let input = json!({"file_path": "/w/src/lib.rs"});
            let calls = vec![call(&format!("{}-1", id), "Read", 6, input)];
            s.forks.push(crate::stats::ForkStats {
                id: id.to_string(),
                agent_type: Some("Explore".into()),
                description: None,
                files: crate::stats::file_changes(&calls),
                tool_calls: calls,
            });
        }
        let graph = build_graph(&s);

        for id in ["tool:Read", "fork:agent-a/tool:Read", "fork:agent-b/tool:Read"] {
            let expected = if id == "tool:Read" { Some(2) } else { Some(1) };
            assert_eq!(graph.node(id).unwrap().count, expected);
        }
        assert!(graph.node("fork:agent-a/file:/w/src/lib.rs").is_some());
        assert!(graph.node("fork:agent-b/file:/w/src/lib.rs").is_some());
        assert_eq!(graph.node("fork:agent-a").unwrap().label, "Explore");

        let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.len(), graph.nodes.len());
        assert_eq!(graph.links.iter().filter(|l| l.is_latest == Some(true)).count(), 1);
    }

    #[test]
    fn test_todos_attach_to_root() {
        let mut s = stats();
        s.todos = vec![TodoItem {
            content: "write docs".into(),
            status: "completed".into(),
        }];
        let graph = build_graph(&s);
        let todo = graph.node("todo:write docs").unwrap();
        assert_eq!(todo.task_status, Some(TaskStatus::Completed));
        assert!(
            graph
                .links
                .iter()
                .any(|l| l.source == "session:abc12345-session" && l.target == "todo:write docs")
        );
    }
}
