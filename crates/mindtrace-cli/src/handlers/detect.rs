use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use super::HandlerContext;
use super::context::{print_json, rfc3339};

#[derive(Serialize)]
struct DetectView {
    provider: String,
    base_dir: PathBuf,
    expected_dir: PathBuf,
    discovered_dir: Option<PathBuf>,
    active_session: Option<String>,
    last_activity: Option<String>,
}

pub fn handle(ctx: &HandlerContext) -> Result<()> {
    let provider = &ctx.provider;
    let discovery = provider.discover_session_dir(ctx.workspace());
    let active = provider.find_active_session(ctx.workspace());

    print_json(&DetectView {
        provider: provider.kind().to_string(),
        base_dir: provider.base_dir().to_path_buf(),
        expected_dir: discovery.expected,
        discovered_dir: discovery.discovered,
        last_activity: rfc3339(active.as_ref().and_then(|s| s.modified)),
        active_session: active.map(|s| s.id),
    })
}
