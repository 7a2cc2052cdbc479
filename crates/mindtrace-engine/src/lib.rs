// Engine: folds canonical events into session statistics and derives the
// mind-map graph from them. Pure; no I/O.

pub mod accumulate;
pub mod extract;
pub mod graph;
pub mod stats;

pub use accumulate::StatsAccumulator;
pub use extract::Product;
pub use graph::build_graph;
pub use stats::{FileChange, ForkStats, SessionStats, TodoItem, ToolCall, TrackedTask};

use mindtrace_types::{CanonicalEvent, MindMapGraph};

/// Accumulate one session's events and build its graph in one step
pub fn graph_from_events(session_id: &str, events: &[CanonicalEvent]) -> MindMapGraph {
    let mut acc = StatsAccumulator::new(session_id);
    acc.ingest_all(events);
    build_graph(&acc.stats())
}
