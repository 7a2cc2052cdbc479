use thiserror::Error;

/// Result type for mindtrace-providers operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the providers layer
///
/// These never cross the reader/provider boundary: public reader and
/// discovery operations log them and degrade to "no data yet".
#[derive(Debug, Error)]
pub enum Error {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Relational store query failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Walkdir error
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Record parsed but is not usable (missing required fields, bad shape)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Provider not found or detection failed
    #[error("Provider error: {0}")]
    Provider(String),
}
