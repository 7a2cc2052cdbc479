use clap::{Parser, Subcommand};
use mindtrace_providers::ProviderKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mindtrace")]
#[command(
    about = "Follow AI coding-assistant sessions and map what they touched",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Workspace whose sessions are read (defaults to the current directory)
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Force a provider instead of detecting the most recently active one
    #[arg(long, global = true, value_parser = parse_provider)]
    pub provider: Option<ProviderKind>,

    /// Config file (defaults to $MINDTRACE_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show which provider would be used for the workspace")]
    Detect,

    #[command(about = "List the workspace's sessions, newest first")]
    Sessions {
        #[arg(long)]
        limit: Option<usize>,
    },

    #[command(about = "Print a session's canonical events as JSON lines")]
    Events {
        /// Session id (defaults to the active session)
        #[arg(long)]
        session: Option<String>,

        /// Keep polling for new events
        #[arg(long)]
        follow: bool,

        /// Stop following after this many polls
        #[arg(long, requires = "follow")]
        max_polls: Option<usize>,
    },

    #[command(about = "List a session's subagent forks")]
    Forks {
        #[arg(long)]
        session: Option<String>,
    },

    #[command(about = "Search a session's messages for text")]
    Search {
        query: String,

        #[arg(long)]
        session: Option<String>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    #[command(about = "Print accumulated statistics and context usage for a session")]
    Stats {
        #[arg(long)]
        session: Option<String>,
    },

    #[command(about = "Print a session's mind-map graph as JSON")]
    Graph {
        #[arg(long)]
        session: Option<String>,
    },
}

fn parse_provider(value: &str) -> Result<ProviderKind, String> {
    value.parse().map_err(|e: mindtrace_providers::Error| e.to_string())
}
