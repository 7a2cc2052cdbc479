use anyhow::{Context, Result};
use mindtrace_providers::Detector;
use tracing_subscriber::EnvFilter;

use super::args::{Cli, Commands};
use super::handlers::{self, HandlerContext};
use crate::config::Config;

pub const LOG_ENV: &str = "MINDTRACE_LOG";

/// stderr only; stdout is reserved for JSON output
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // a second init (e.g. from tests driving `run`) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    init_logging();

    let config = Config::load(cli.config.as_deref())?;
    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };
    let workspace = workspace.canonicalize().unwrap_or(workspace);

    let detector = Detector::new(config.detector_config(cli.provider));
    let provider = detector.detect(&workspace);
    tracing::debug!(
        provider = %provider.kind(),
        workspace = %workspace.display(),
        "provider selected"
    );

    let ctx = HandlerContext {
        provider,
        workspace,
        config,
    };

    match cli.command {
        Commands::Detect => handlers::detect::handle(&ctx),
        Commands::Sessions { limit } => handlers::sessions::handle(&ctx, limit),
        Commands::Events {
            session,
            follow,
            max_polls,
        } => handlers::events::handle(&ctx, session.as_deref(), follow, max_polls),
        Commands::Forks { session } => handlers::forks::handle(&ctx, session.as_deref()),
        Commands::Search {
            query,
            session,
            limit,
        } => handlers::search::handle(&ctx, &query, session.as_deref(), limit),
        Commands::Stats { session } => handlers::stats::handle(&ctx, session.as_deref()),
        Commands::Graph { session } => handlers::graph::handle(&ctx, session.as_deref()),
    }
}
