mod context;

pub mod detect;
pub mod events;
pub mod forks;
pub mod graph;
pub mod search;
pub mod sessions;
pub mod stats;

pub use context::HandlerContext;
