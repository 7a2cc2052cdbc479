// Error types
pub mod error;

// Provider / reader interfaces
pub mod traits;

// Incremental readers (file tailing, cursors)
pub mod reader;

// Provider implementations
pub mod claude;
pub mod codex;
pub mod opencode;

// Provider selection
pub mod detector;

// Read-only row queries against relational stores
pub mod rows;

// Shared helpers
mod ids;
pub mod paths;
pub mod search;
pub mod token_limits;

pub use detector::{Detector, DetectorConfig};
pub use error::{Error, Result};
pub use paths::ProviderPaths;
pub use reader::{JsonlTailReader, ReaderCursor, RowMark, TailCursor, WatermarkCursor};
pub use rows::{RowQuery, SqliteRows};
pub use traits::{
    ForkInfo, Provider, ProviderKind, RecordNormalizer, SearchHit, SessionDirDiscovery,
    SessionReader, SessionRef,
};

pub use claude::ClaudeProvider;
pub use codex::CodexProvider;
pub use opencode::OpenCodeProvider;
