use anyhow::Result;
use mindtrace_engine::SessionStats;
use serde::Serialize;

use super::HandlerContext;
use super::context::print_json;
use super::graph::{accumulate, session_events};

#[derive(Serialize)]
struct ContextView {
    /// Tokens occupying the window as of the latest assistant turn
    used: u64,
    window: Option<u64>,
}

#[derive(Serialize)]
struct StatsView {
    provider: String,
    #[serde(flatten)]
    stats: SessionStats,
    context: Option<ContextView>,
}

pub fn handle(ctx: &HandlerContext, session: Option<&str>) -> Result<()> {
    let session = ctx.session(session)?;
    let events = session_events(ctx, &session);
    let stats = accumulate(ctx, &session, &events).stats();

    let context = events
        .iter()
        .rev()
        .find_map(|e| e.message.usage)
        .map(|usage| ContextView {
            used: ctx.provider.context_size(&usage),
            window: stats.model.as_deref().and_then(|m| ctx.provider.context_window(m)),
        });

    print_json(&StatsView {
        provider: ctx.provider.kind().to_string(),
        stats,
        context,
    })
}
