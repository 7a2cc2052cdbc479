use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use super::HandlerContext;
use super::context::print_json_lines;

#[derive(Serialize)]
struct ForkView {
    id: String,
    agent_type: Option<String>,
    description: Option<String>,
    path: PathBuf,
    events: usize,
}

pub fn handle(ctx: &HandlerContext, session: Option<&str>) -> Result<()> {
    let session = ctx.session(session)?;
    let forks = ctx.provider.scan_subagents(&session);

    print_json_lines(forks.into_iter().map(|fork| ForkView {
        events: fork.events.len(),
        id: fork.id,
        agent_type: fork.agent_type,
        description: fork.description,
        path: fork.path,
    }))
}
