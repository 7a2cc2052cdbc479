pub mod event;
pub mod graph;
mod util;

pub use event::*;
pub use graph::*;
pub use util::*;
