// mindtrace CLI
//
// Everything here is a thin host around the library crates: it reads the
// config file, installs logging, picks a provider and prints what the
// providers and the engine produce. stdout carries JSON only; diagnostics go
// to stderr through tracing.

mod args;
mod commands;
pub mod config;
mod handlers;

pub use args::{Cli, Commands};
pub use commands::run;
