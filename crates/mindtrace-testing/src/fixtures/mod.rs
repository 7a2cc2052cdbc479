//! Writers for the three provider-native layouts.
//!
//! Line builders return one JSON record serialized on a single line; the
//! `*Fixture` types place them where each provider looks for them.

pub mod claude;
pub mod codex;
pub mod opencode;

pub use claude::ClaudeFixture;
pub use codex::CodexFixture;
pub use opencode::{OpenCodeFixture, OpenCodeMessage, OpenCodeSession};

use anyhow::Result;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Write `lines` as a newline-terminated JSONL file, creating parent directories
pub fn write_jsonl(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

/// Append raw text (possibly without a trailing newline)
pub fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new().append(true).create(true).open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

/// Set a file's mtime to `secs_ago` seconds before now
pub fn age(path: &Path, secs_ago: u64) -> Result<()> {
    let time = SystemTime::now() - Duration::from_secs(secs_ago);
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(time))?;
    Ok(())
}

/// Set a file's mtime to an exact epoch-milliseconds value
pub fn set_mtime_ms(path: &Path, ms: i64) -> Result<()> {
    let time = SystemTime::UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64);
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(time))?;
    Ok(())
}
