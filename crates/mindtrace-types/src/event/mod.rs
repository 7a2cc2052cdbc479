pub mod content;
pub mod event;
pub mod usage;

pub use content::*;
pub use event::*;
pub use usage::*;
