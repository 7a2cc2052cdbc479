use mindtrace_types::CanonicalEvent;
use serde_json::Value;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{ReaderCursor, TailCursor};
use crate::traits::{RecordNormalizer, SessionReader};

/// Upper bound on bytes consumed by one `read_new` call
const MAX_READ_BYTES: u64 = 8 * 1024 * 1024;

/// Bytes from the head of the file kept to recognise a replaced file
const FINGERPRINT_BYTES: usize = 256;

/// Incremental reader over an append-only JSONL file
///
/// Each call reads from the stored byte offset to the current end of file (at
/// most `MAX_READ_BYTES`), hands every complete line to the normalizer and keeps
/// the unterminated tail for the next call. A file that shrank below the offset,
/// or whose head no longer matches what was read before, is treated as
/// truncated: cursor and normalizer state are reset before anything new is parsed.
pub struct JsonlTailReader<N: RecordNormalizer> {
    path: PathBuf,
    cursor: TailCursor,
    fingerprint: Vec<u8>,
    normalizer: N,
    truncated: bool,
    line_no: usize,
}

impl<N: RecordNormalizer> JsonlTailReader<N> {
    pub fn new(path: impl Into<PathBuf>, normalizer: N) -> Self {
        Self {
            path: path.into(),
            cursor: TailCursor::default(),
            fingerprint: Vec::new(),
            normalizer,
            truncated: false,
            line_no: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn normalizer(&self) -> &N {
        &self.normalizer
    }

    fn reset_state(&mut self) {
        self.cursor = TailCursor::default();
        self.fingerprint.clear();
        self.normalizer.reset();
        self.line_no = 0;
    }

    fn head_changed(&self, file: &mut File) -> bool {
        if self.fingerprint.is_empty() {
            return false;
        }
        let mut head = vec![0u8; self.fingerprint.len()];
        match file.seek(SeekFrom::Start(0)).and_then(|_| file.read_exact(&mut head)) {
            Ok(()) => head != self.fingerprint,
            Err(_) => true,
        }
    }

    fn read_chunk(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let size = file.metadata()?.len();

        if size < self.cursor.offset || self.head_changed(&mut file) {
            tracing::info!(
                path = %self.path.display(),
                offset = self.cursor.offset,
                size,
                "session file truncated, resetting reader"
            );
            self.reset_state();
            self.truncated = true;
        }

        if size == self.cursor.offset {
            return Ok(None);
        }

        let to_read = (size - self.cursor.offset).min(MAX_READ_BYTES);
        file.seek(SeekFrom::Start(self.cursor.offset))?;
        let mut buf = Vec::with_capacity(to_read as usize);
        file.by_ref().take(to_read).read_to_end(&mut buf)?;

        if self.fingerprint.len() < FINGERPRINT_BYTES
            && self.cursor.offset < FINGERPRINT_BYTES as u64
        {
            let start = self.cursor.offset as usize;
            let want = FINGERPRINT_BYTES.saturating_sub(start).min(buf.len());
            if start == self.fingerprint.len() {
                self.fingerprint.extend_from_slice(&buf[..want]);
            }
        }

        self.cursor.offset += buf.len() as u64;
        Ok(Some(buf))
    }

    fn parse_line(&mut self, bytes: &[u8]) -> Vec<CanonicalEvent> {
        self.line_no += 1;
        let line = match std::str::from_utf8(bytes) {
            Ok(s) => s.trim(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    line = self.line_no,
                    error = %e,
                    "skipping non-UTF-8 record"
                );
                return Vec::new();
            }
        };
        if line.is_empty() {
            return Vec::new();
        }
        match self.normalizer.normalize_line(line) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    line = self.line_no,
                    error = %e,
                    "skipping malformed record"
                );
                Vec::new()
            }
        }
    }
}

impl<N: RecordNormalizer> SessionReader for JsonlTailReader<N> {
    fn read_new(&mut self) -> Vec<CanonicalEvent> {
        self.truncated = false;

        let chunk = match self.read_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read session file"
                );
                return Vec::new();
            }
        };

        let mut data = std::mem::take(&mut self.cursor.partial);
        data.extend_from_slice(&chunk);

        let complete_len = match data.iter().rposition(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None => {
                self.cursor.partial = data;
                return Vec::new();
            }
        };
        self.cursor.partial = data.split_off(complete_len);

        let mut events = Vec::new();
        for line in data[..complete_len - 1].split(|&b| b == b'\n') {
            events.extend(self.parse_line(line));
        }
        events
    }

    fn read_all(&mut self) -> Vec<CanonicalEvent> {
        self.reset();
        let mut events = Vec::new();
        loop {
            let before = self.cursor.offset;
            events.extend(self.read_new());
            if self.cursor.offset == before {
                break;
            }
        }
        events
    }

    fn reset(&mut self) {
        self.reset_state();
        self.truncated = false;
    }

    fn flush(&mut self) -> Vec<CanonicalEvent> {
        let mut events = self.read_new();
        if self.cursor.partial.is_empty() {
            return events;
        }
        let text = String::from_utf8_lossy(&self.cursor.partial).trim().to_string();
        if text.is_empty() {
            self.cursor.partial.clear();
            return events;
        }
        // An unterminated tail that does not parse may still be mid-write
        if serde_json::from_str::<Value>(&text).is_ok() {
            let partial = std::mem::take(&mut self.cursor.partial);
            events.extend(self.parse_line(&partial));
        }
        events
    }

    fn was_truncated(&self) -> bool {
        self.truncated
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn cursor(&self) -> ReaderCursor {
        ReaderCursor::Tail(self.cursor.clone())
    }

    fn reported_context_window(&self) -> Option<u64> {
        self.normalizer.reported_context_window()
    }

    fn rate_limits(&self) -> Option<Value> {
        self.normalizer.rate_limits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Result};
    use chrono::Utc;
    use mindtrace_types::ContentBlock;
    use std::io::Write;

    /// Emits one user event per `{"text": ..}` line; counts resets
    #[derive(Default)]
    struct EchoNormalizer {
        resets: usize,
    }

    impl RecordNormalizer for EchoNormalizer {
        fn normalize_line(&mut self, line: &str) -> Result<Vec<CanonicalEvent>> {
            let value: Value = serde_json::from_str(line)?;
            let text = value
                .get("text")
                .and_then(|t| t.as_str())
                .ok_or_else(|| Error::Parse("missing text".into()))?;
            Ok(vec![CanonicalEvent::user(text, Utc::now(), vec![ContentBlock::text(text)])])
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn texts(events: &[CanonicalEvent]) -> Vec<String> {
        events.iter().map(|e| e.text()).collect()
    }

    fn append(path: &Path, data: &str) {
        let mut f = std::fs::OpenOptions::new().create(true).append(true).open(path).unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader =
            JsonlTailReader::new(dir.path().join("absent.jsonl"), EchoNormalizer::default());
        assert!(reader.read_new().is_empty());
        assert!(!reader.exists());
        assert!(!reader.was_truncated());
    }

    #[test]
    fn test_reads_only_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"text\":\"a\"}\n{\"text\":\"b\"}\n");

        let mut reader = JsonlTailReader::new(&path, EchoNormalizer::default());
        assert_eq!(texts(&reader.read_new()), vec!["a", "b"]);
        assert!(reader.read_new().is_empty());

        append(&path, "{\"text\":\"c\"}\n");
        assert_eq!(texts(&reader.read_new()), vec!["c"]);
    }

    #[test]
    fn test_partial_line_is_buffered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"text\":\"a\"}\n{\"te");

        let mut reader = JsonlTailReader::new(&path, EchoNormalizer::default());
        assert_eq!(texts(&reader.read_new()), vec!["a"]);
        match reader.cursor() {
            ReaderCursor::Tail(c) => assert_eq!(c.partial, b"{\"te".to_vec()),
            other => panic!("unexpected cursor {:?}", other),
        }

        append(&path, "xt\":\"b\"}\n");
        assert_eq!(texts(&reader.read_new()), vec!["b"]);
    }

    #[test]
    fn test_malformed_line_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"text\":\"a\"}\nnot json\n{\"nope\":1}\n{\"text\":\"b\"}\n");

        let mut reader = JsonlTailReader::new(&path, EchoNormalizer::default());
        assert_eq!(texts(&reader.read_new()), vec!["a", "b"]);
    }

    #[test]
    fn test_truncation_resets_cursor_and_normalizer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"text\":\"first\"}\n{\"text\":\"second\"}\n");

        let mut reader = JsonlTailReader::new(&path, EchoNormalizer::default());
        assert_eq!(reader.read_new().len(), 2);

        std::fs::write(&path, "").unwrap();
        append(&path, "{\"text\":\"new\"}\n");

        assert_eq!(texts(&reader.read_new()), vec!["new"]);
        assert!(reader.was_truncated());
        assert_eq!(reader.normalizer().resets, 1);
        match reader.cursor() {
            ReaderCursor::Tail(c) => assert_eq!(c.offset, "{\"text\":\"new\"}\n".len() as u64),
            other => panic!("unexpected cursor {:?}", other),
        }

        assert!(reader.read_new().is_empty());
        assert!(!reader.was_truncated());
    }

    #[test]
    fn test_replaced_file_longer_than_offset_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"text\":\"a\"}\n");

        let mut reader = JsonlTailReader::new(&path, EchoNormalizer::default());
        assert_eq!(reader.read_new().len(), 1);

        std::fs::write(&path, "{\"text\":\"x\"}\n{\"text\":\"y\"}\n").unwrap();
        assert_eq!(texts(&reader.read_new()), vec!["x", "y"]);
        assert!(reader.was_truncated());
    }

    #[test]
    fn test_flush_parses_complete_unterminated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"text\":\"a\"}\n{\"text\":\"tail\"}");

        let mut reader = JsonlTailReader::new(&path, EchoNormalizer::default());
        assert_eq!(texts(&reader.read_new()), vec!["a"]);
        assert_eq!(texts(&reader.flush()), vec!["tail"]);
        assert!(reader.flush().is_empty());
    }

    #[test]
    fn test_flush_keeps_incomplete_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"text\":\"a\"}\n{\"text\":");

        let mut reader = JsonlTailReader::new(&path, EchoNormalizer::default());
        assert_eq!(texts(&reader.flush()), vec!["a"]);

        append(&path, "\"b\"}\n");
        assert_eq!(texts(&reader.read_new()), vec!["b"]);
    }

    #[test]
    fn test_read_all_rereads_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        append(&path, "{\"text\":\"a\"}\n{\"text\":\"b\"}\n");

        let mut reader = JsonlTailReader::new(&path, EchoNormalizer::default());
        reader.read_new();
        assert_eq!(texts(&reader.read_all()), vec!["a", "b"]);
        assert!(!reader.was_truncated());
    }
}
