use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use super::HandlerContext;
use super::context::{print_json_lines, rfc3339};

#[derive(Serialize)]
struct SessionView {
    id: String,
    provider: String,
    path: PathBuf,
    modified: Option<String>,
    label: Option<String>,
}

pub fn handle(ctx: &HandlerContext, limit: Option<usize>) -> Result<()> {
    let provider = &ctx.provider;
    let sessions = provider.find_all_sessions(ctx.workspace());
    let limit = limit.unwrap_or(sessions.len());

    print_json_lines(sessions.iter().take(limit).map(|session| SessionView {
        id: session.id.clone(),
        provider: session.kind.to_string(),
        path: session.path.clone(),
        modified: rfc3339(session.modified),
        label: provider.session_label(session),
    }))
}
