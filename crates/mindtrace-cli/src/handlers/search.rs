use anyhow::Result;
use mindtrace_types::Role;
use serde::Serialize;

use super::HandlerContext;
use super::context::print_json_lines;

#[derive(Serialize)]
struct HitView {
    timestamp: String,
    role: Role,
    snippet: String,
}

pub fn handle(
    ctx: &HandlerContext,
    query: &str,
    session: Option<&str>,
    limit: usize,
) -> Result<()> {
    let session = ctx.session(session)?;
    let hits = ctx.provider.search_session(&session, query, limit);
    tracing::debug!(session = %session.id, query, hits = hits.len(), "search finished");

    print_json_lines(hits.into_iter().map(|hit| HitView {
        timestamp: hit.timestamp.to_rfc3339(),
        role: hit.role,
        snippet: hit.snippet,
    }))
}
