mod tail;

pub use tail::JsonlTailReader;

use serde::{Deserialize, Serialize};

/// Byte position in an append-only JSONL file
///
/// `offset` counts every byte consumed from the file, including the trailing
/// bytes held in `partial` that have not yet seen their terminating newline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailCursor {
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial: Vec<u8>,
}

/// Last `(update time, row id)` consumed from one table
///
/// Rows are read in `(updated_ms, id)` order, so a batch that stops inside a
/// run of equal update times resumes at the next id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMark {
    pub updated_ms: i64,
    #[serde(default)]
    pub id: String,
}

impl RowMark {
    pub fn new(updated_ms: i64, id: impl Into<String>) -> Self {
        Self {
            updated_ms,
            id: id.into(),
        }
    }

    /// Whether the row keyed `(updated_ms, id)` sorts strictly after this mark
    pub fn is_before(&self, updated_ms: i64, id: &str) -> bool {
        (self.updated_ms, self.id.as_str()) < (updated_ms, id)
    }
}

/// Keyset watermarks for a relational (or per-record file) store
///
/// Times are epoch milliseconds. `caught_up` flips once the first poll has
/// advanced the watermarks to "now" without emitting anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkCursor {
    pub message: RowMark,
    pub part: RowMark,
    pub caught_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReaderCursor {
    Tail(TailCursor),
    Watermark(WatermarkCursor),
}
