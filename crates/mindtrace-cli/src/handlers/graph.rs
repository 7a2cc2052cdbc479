use anyhow::Result;
use mindtrace_engine::{StatsAccumulator, build_graph};
use mindtrace_providers::SessionRef;
use mindtrace_types::CanonicalEvent;

use super::HandlerContext;
use super::context::print_json;

/// Everything the session's log holds right now
pub(super) fn session_events(ctx: &HandlerContext, session: &SessionRef) -> Vec<CanonicalEvent> {
    let mut reader = ctx.provider.create_reader(session);
    let mut events = reader.read_all();
    events.extend(reader.flush());
    events
}

/// Main-session events plus every subagent fork, folded into one accumulator
pub(super) fn accumulate(
    ctx: &HandlerContext,
    session: &SessionRef,
    events: &[CanonicalEvent],
) -> StatsAccumulator {
    let mut acc = StatsAccumulator::new(session.id.as_str());
    acc.ingest_all(events);
    for fork in ctx.provider.scan_subagents(session) {
        acc.ingest_fork(
            &fork.id,
            fork.agent_type.as_deref(),
            fork.description.as_deref(),
            &fork.events,
        );
    }
    acc
}

pub fn handle(ctx: &HandlerContext, session: Option<&str>) -> Result<()> {
    let session = ctx.session(session)?;
    let events = session_events(ctx, &session);
    let graph = build_graph(&accumulate(ctx, &session, &events).stats());
    tracing::debug!(nodes = graph.nodes.len(), links = graph.links.len(), "graph built");
    print_json(&graph)
}
