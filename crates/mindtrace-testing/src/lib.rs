//! Testing infrastructure for mindtrace integration tests.
//!
//! - `TestWorld`: isolated provider data roots plus a workspace directory
//! - `fixtures`: writers for the Claude, Codex and OpenCode native layouts

pub mod fixtures;
pub mod world;

pub use world::{CliResult, TestWorld};
