use mindtrace_types::{CanonicalEvent, TokenUsage};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::fold::fold_fresh_parts;
use super::store::{MessageStore, StoredMessage, StoredPart};
use crate::Result;
use crate::ids::EventIds;
use crate::reader::{ReaderCursor, RowMark, WatermarkCursor};
use crate::traits::SessionReader;

/// Rows fetched per table per poll
pub const DEFAULT_BATCH_LIMIT: usize = 500;

/// Watermark-polling reader over one OpenCode session
///
/// The first poll after construction only advances the watermarks to the
/// store's newest rows. Later polls fold every message touched since
/// (directly or through one of its parts), emitting only the parts that are
/// new or changed since they were last handed out, and usage only when it
/// differs from what was last reported. A part or reply whose message cannot
/// be resolved holds the watermarks back so the whole batch is retried on the
/// next poll.
pub struct OpenCodeReader {
    store: Arc<dyn MessageStore>,
    session_id: String,
    ids: EventIds,
    cursor: WatermarkCursor,
    batch_limit: usize,
    emitted: Emitted,
}

/// What the reader has handed out since construction or its last reset
#[derive(Debug, Default)]
struct Emitted {
    /// Part id -> update time of the version already folded
    parts: HashMap<String, i64>,
    usage: HashMap<String, TokenUsage>,
    /// Summary event id -> text
    summaries: HashMap<String, String>,
    /// Unseen parts keyed at or before this mark predate the reader
    horizon: RowMark,
}

impl Emitted {
    fn is_fresh(&self, stored: &StoredPart) -> bool {
        match self.parts.get(&stored.part.id) {
            Some(updated) => *updated != stored.updated_ms,
            None => self.horizon.is_before(stored.updated_ms, &stored.part.id),
        }
    }

    /// Drop summaries and usage identical to what was already reported
    fn retain_changed(
        &mut self,
        message_id: &str,
        events: Vec<CanonicalEvent>,
    ) -> Vec<CanonicalEvent> {
        let mut kept = Vec::with_capacity(events.len());
        for mut event in events {
            if event.is_summary() {
                let text = event.text();
                if self.summaries.get(&event.message.id) == Some(&text) {
                    continue;
                }
                self.summaries.insert(event.message.id.clone(), text);
            } else if event.is_assistant() && event.message.id == message_id {
                if let Some(usage) = event.message.usage {
                    if self.usage.get(message_id) == Some(&usage) {
                        event.message.usage = None;
                    } else {
                        self.usage.insert(message_id.to_string(), usage);
                    }
                }
                if event.message.usage.is_none() && event.message.content.is_empty() {
                    continue;
                }
            }
            kept.push(event);
        }
        kept
    }
}

impl OpenCodeReader {
    pub fn new(store: Arc<dyn MessageStore>, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        Self {
            ids: EventIds::new(&session_id),
            store,
            session_id,
            cursor: WatermarkCursor::default(),
            batch_limit: DEFAULT_BATCH_LIMIT,
            emitted: Emitted::default(),
        }
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn catch_up(&mut self) -> Result<()> {
        let (message, part) = self.store.latest_updates(&self.session_id)?;
        tracing::debug!(
            session = %self.session_id,
            message = message.updated_ms,
            part = part.updated_ms,
            "opencode reader caught up"
        );
        self.emitted = Emitted {
            horizon: part.clone(),
            ..Emitted::default()
        };
        self.cursor = WatermarkCursor {
            message,
            part,
            caught_up: true,
        };
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<CanonicalEvent>> {
        if !self.cursor.caught_up {
            self.catch_up()?;
            return Ok(Vec::new());
        }

        let sid = self.session_id.as_str();
        let messages = self.store.messages_since(sid, &self.cursor.message, self.batch_limit)?;
        let parts = self.store.parts_since(sid, &self.cursor.part, self.batch_limit)?;
        if messages.is_empty() && parts.is_empty() {
            return Ok(Vec::new());
        }

        // rows arrive in key order, so the last one is the new mark
        let next_message = messages.last().map(|m| RowMark::new(m.updated_ms, m.info.id.as_str()));
        let next_part = parts.last().map(|p| RowMark::new(p.updated_ms, p.part.id.as_str()));

        let mut changed: HashMap<String, StoredMessage> =
            messages.into_iter().map(|m| (m.info.id.clone(), m)).collect();
        let mut unresolved = Vec::new();

        for part in &parts {
            if changed.contains_key(&part.message_id) {
                continue;
            }
            match self.store.message(sid, &part.message_id)? {
                Some(message) => {
                    changed.insert(part.message_id.clone(), message);
                }
                None => unresolved.push(part.message_id.clone()),
            }
        }

        let parents: Vec<String> = changed
            .values()
            .filter_map(|m| m.info.parent_id.clone())
            .filter(|parent| !changed.contains_key(parent))
            .collect();
        for parent in parents {
            if self.store.message(sid, &parent)?.is_none() {
                unresolved.push(parent);
            }
        }

        if !unresolved.is_empty() {
            tracing::debug!(
                session = %self.session_id,
                missing = ?unresolved,
                "opencode batch references messages not yet visible, retrying next poll"
            );
            return Ok(Vec::new());
        }

        let mut ordered: Vec<StoredMessage> = changed.into_values().collect();
        ordered.sort_by(|a, b| {
            a.info
                .time
                .created
                .cmp(&b.info.time.created)
                .then_with(|| a.info.id.cmp(&b.info.id))
        });

        let mut batch = Vec::with_capacity(ordered.len());
        for message in ordered {
            let parts = self.store.parts_of(&message.info.id)?;
            batch.push((message, parts));
        }

        let mut events = Vec::new();
        for (message, parts) in batch {
            let fresh: HashSet<String> = parts
                .iter()
                .filter(|p| self.emitted.is_fresh(p))
                .map(|p| p.part.id.clone())
                .collect();
            for stored in parts.iter().filter(|p| fresh.contains(&p.part.id)) {
                self.emitted.parts.insert(stored.part.id.clone(), stored.updated_ms);
            }
            let parts = parts.into_iter().map(|p| p.part).collect();
            let folded =
                fold_fresh_parts(&self.ids, &message.info, parts, |p| fresh.contains(&p.id));
            events.extend(self.emitted.retain_changed(&message.info.id, folded));
        }

        if let Some(mark) = next_message {
            self.cursor.message = mark;
        }
        if let Some(mark) = next_part {
            self.cursor.part = mark;
        }
        Ok(events)
    }
}

impl SessionReader for OpenCodeReader {
    fn read_new(&mut self) -> Vec<CanonicalEvent> {
        match self.poll() {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(session = %self.session_id, error = %e, "opencode poll failed");
                Vec::new()
            }
        }
    }

    fn read_all(&mut self) -> Vec<CanonicalEvent> {
        self.reset();
        let mut events = Vec::new();
        loop {
            let before = self.cursor.clone();
            events.extend(self.read_new());
            if self.cursor == before {
                break;
            }
        }
        events
    }

    /// Replay from the beginning on the next poll
    fn reset(&mut self) {
        self.cursor = WatermarkCursor {
            caught_up: true,
            ..WatermarkCursor::default()
        };
        self.emitted = Emitted::default();
    }

    fn exists(&self) -> bool {
        matches!(self.store.session(&self.session_id), Ok(Some(_)))
    }

    fn cursor(&self) -> ReaderCursor {
        ReaderCursor::Watermark(self.cursor.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::opencode::schema::{MessageInfo, Part};
    use crate::opencode::store::StoredSession;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// In-memory single-session store with switchable query failure
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        messages: Mutex<Vec<StoredMessage>>,
        parts: Mutex<Vec<StoredPart>>,
        fail: Mutex<bool>,
    }

    impl MemoryStore {
        pub fn add_message(
            &self,
            id: &str,
            role: &str,
            created: i64,
            updated: i64,
            extra: serde_json::Value,
        ) {
            let mut value = json!({"id": id, "role": role, "time": {"created": created}});
            if let (Some(obj), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
                obj.extend(extra.clone());
            }
            let info: MessageInfo = serde_json::from_value(value).unwrap();
            self.messages.lock().unwrap().push(StoredMessage { info, updated_ms: updated });
        }

        pub fn add_part(&self, message_id: &str, updated: i64, part: serde_json::Value) {
            let part: Part = serde_json::from_value(part).unwrap();
            self.parts.lock().unwrap().push(StoredPart {
                message_id: message_id.to_string(),
                part,
                updated_ms: updated,
            });
        }

        fn fail_next(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        fn check(&self) -> Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(crate::Error::Provider("query timed out".to_string()));
            }
            Ok(())
        }
    }

    impl MessageStore for MemoryStore {
        fn location(&self) -> PathBuf {
            PathBuf::from("memory")
        }

        fn sessions(&self) -> Result<Vec<StoredSession>> {
            Ok(vec![StoredSession {
                id: "ses_1".to_string(),
                project_id: None,
                parent_id: None,
                directory: Some("/w".to_string()),
                title: None,
                updated_ms: 0,
                path: PathBuf::from("memory"),
            }])
        }

        fn messages_since(
            &self,
            _session: &str,
            after: &RowMark,
            limit: usize,
        ) -> Result<Vec<StoredMessage>> {
            self.check()?;
            let mut found: Vec<_> = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| after.is_before(m.updated_ms, &m.info.id))
                .cloned()
                .collect();
            found.sort_by(|a, b| (a.updated_ms, &a.info.id).cmp(&(b.updated_ms, &b.info.id)));
            found.truncate(limit);
            Ok(found)
        }

        fn parts_since(
            &self,
            _session: &str,
            after: &RowMark,
            limit: usize,
        ) -> Result<Vec<StoredPart>> {
            self.check()?;
            let mut found: Vec<_> = self
                .parts
                .lock()
                .unwrap()
                .iter()
                .filter(|p| after.is_before(p.updated_ms, &p.part.id))
                .cloned()
                .collect();
            found.sort_by(|a, b| (a.updated_ms, &a.part.id).cmp(&(b.updated_ms, &b.part.id)));
            found.truncate(limit);
            Ok(found)
        }

        fn message(&self, _session: &str, message_id: &str) -> Result<Option<StoredMessage>> {
            self.check()?;
            let messages = self.messages.lock().unwrap();
            Ok(messages.iter().find(|m| m.info.id == message_id).cloned())
        }

        fn parts_of(&self, message_id: &str) -> Result<Vec<StoredPart>> {
            self.check()?;
            let mut found: Vec<_> = self
                .parts
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.message_id == message_id)
                .cloned()
                .collect();
            found.sort_by(|a, b| a.part.id.cmp(&b.part.id));
            Ok(found)
        }

        fn latest_updates(&self, _session: &str) -> Result<(RowMark, RowMark)> {
            self.check()?;
            let messages = self.messages.lock().unwrap();
            let parts = self.parts.lock().unwrap();
            let m = messages
                .iter()
                .map(|m| (m.updated_ms, m.info.id.as_str()))
                .max()
                .map(|(updated, id)| RowMark::new(updated, id));
            let p = parts
                .iter()
                .map(|p| (p.updated_ms, p.part.id.as_str()))
                .max()
                .map(|(updated, id)| RowMark::new(updated, id));
            Ok((m.unwrap_or_default(), p.unwrap_or_default()))
        }
    }

    fn text_part(id: &str, text: &str) -> serde_json::Value {
        json!({"id": id, "type": "text", "text": text})
    }

    #[test]
    fn test_first_poll_catches_up_without_events() {
        let store = Arc::new(MemoryStore::default());
        store.add_message("msg_1", "user", 100, 100, json!({}));
        store.add_part("msg_1", 110, text_part("prt_1", "old history"));

        let mut reader = OpenCodeReader::new(store.clone(), "ses_1");
        assert!(reader.read_new().is_empty());
        assert_eq!(
            reader.cursor(),
            ReaderCursor::Watermark(WatermarkCursor {
                message: RowMark::new(100, "msg_1"),
                part: RowMark::new(110, "prt_1"),
                caught_up: true
            })
        );

        store.add_message("msg_2", "user", 200, 200, json!({}));
        store.add_part("msg_2", 210, text_part("prt_2", "new prompt"));
        let events = reader.read_new();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text(), "new prompt");
        assert!(reader.read_new().is_empty());
    }

    #[test]
    fn test_part_fetches_message_explicitly() {
        let store = Arc::new(MemoryStore::default());
        let mut reader = OpenCodeReader::new(store.clone(), "ses_1");
        reader.read_new();

        // message row is older than the watermark's batch but its part is new
        store.add_message("msg_1", "assistant", 50, 0, json!({}));
        store.add_part("msg_1", 300, text_part("prt_1", "streamed reply"));

        let events = reader.read_new();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_assistant());
        assert_eq!(events[0].text(), "streamed reply");
    }

    #[test]
    fn test_unresolved_part_defers_watermark() {
        let store = Arc::new(MemoryStore::default());
        let mut reader = OpenCodeReader::new(store.clone(), "ses_1");
        reader.read_new();

        store.add_part("msg_late", 400, text_part("prt_1", "early part"));
        assert!(reader.read_new().is_empty());
        assert_eq!(
            reader.cursor(),
            ReaderCursor::Watermark(WatermarkCursor {
                caught_up: true,
                ..WatermarkCursor::default()
            })
        );

        store.add_message("msg_late", "assistant", 390, 401, json!({}));
        let events = reader.read_new();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text(), "early part");
    }

    #[test]
    fn test_missing_parent_reply_defers() {
        let store = Arc::new(MemoryStore::default());
        let mut reader = OpenCodeReader::new(store.clone(), "ses_1");
        reader.read_new();

        store.add_message("msg_2", "assistant", 500, 500, json!({"parentID": "msg_1"}));
        store.add_part("msg_2", 501, text_part("prt_2", "answer"));
        assert!(reader.read_new().is_empty());

        store.add_message("msg_1", "user", 490, 502, json!({}));
        store.add_part("msg_1", 503, text_part("prt_1", "question"));
        let texts: Vec<String> = reader.read_new().iter().map(|e| e.text()).collect();
        assert_eq!(texts, vec!["question", "answer"]);
    }

    #[test]
    fn test_query_failure_keeps_cursor() {
        let store = Arc::new(MemoryStore::default());
        let mut reader = OpenCodeReader::new(store.clone(), "ses_1");
        reader.read_new();

        store.add_message("msg_1", "user", 10, 10, json!({}));
        store.add_part("msg_1", 11, text_part("prt_1", "hello"));
        store.fail_next(true);
        assert!(reader.read_new().is_empty());

        store.fail_next(false);
        assert_eq!(reader.read_new().len(), 1);
    }

    #[test]
    fn test_read_all_replays_in_batches() {
        let store = Arc::new(MemoryStore::default());
        for i in 0..5 {
            let id = format!("msg_{}", i);
            store.add_message(&id, "user", i, i + 1, json!({}));
            let part = text_part(&format!("prt_{}", i), &format!("prompt {}", i));
            store.add_part(&id, i + 1, part);
        }

        let mut reader = OpenCodeReader::new(store, "ses_1").with_batch_limit(2);
        let events = reader.read_all();
        let texts: Vec<String> = events.iter().map(|e| e.text()).collect();
        assert_eq!(texts, vec!["prompt 0", "prompt 1", "prompt 2", "prompt 3", "prompt 4"]);
    }

    #[test]
    fn test_equal_update_times_span_batches() {
        let store = Arc::new(MemoryStore::default());
        let mut reader = OpenCodeReader::new(store.clone(), "ses_1").with_batch_limit(2);
        reader.read_new();

        for i in 0..3 {
            let id = format!("msg_{}", i);
            store.add_message(&id, "user", i, 100, json!({}));
            let part = text_part(&format!("prt_{}", i), &format!("prompt {}", i));
            store.add_part(&id, 100, part);
        }

        let mut texts = Vec::new();
        for _ in 0..3 {
            texts.extend(reader.read_new().iter().map(|e| e.text()));
        }
        assert_eq!(texts, vec!["prompt 0", "prompt 1", "prompt 2"]);

        let replayed: Vec<String> = reader.read_all().iter().map(|e| e.text()).collect();
        assert_eq!(replayed, texts);
    }

    #[test]
    fn test_updated_message_emits_only_new_parts() {
        let store = Arc::new(MemoryStore::default());
        let mut reader = OpenCodeReader::new(store.clone(), "ses_1");
        reader.read_new();

        store.add_message("msg_1", "assistant", 10, 10, json!({}));
        store.add_part("msg_1", 11, text_part("prt_1", "first"));
        assert_eq!(reader.read_new()[0].text(), "first");

        store.add_part("msg_1", 20, text_part("prt_2", "second"));
        let events = reader.read_new();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message.id, "msg_1");
        assert_eq!(events[0].text(), "second");
    }

    #[test]
    fn test_new_part_does_not_repeat_finished_tool_or_usage() {
        let store = Arc::new(MemoryStore::default());
        let mut reader = OpenCodeReader::new(store.clone(), "ses_1");
        reader.read_new();

        let tokens = json!({"tokens": {"input": 10, "output": 5, "reasoning": 0,
            "cache": {"read": 0, "write": 0}}});
        store.add_message("msg_1", "assistant", 10, 10, tokens);
        store.add_part(
            "msg_1",
            11,
            json!({"id": "prt_1", "type": "tool", "callID": "call_1", "tool": "bash",
                "state": {"status": "completed", "input": {"command": "ls"}, "output": "a.rs"}}),
        );
        let first = reader.read_new();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].tool_uses().count(), 1);
        assert_eq!(first[0].message.usage.map(|u| u.input_tokens), Some(10));
        assert_eq!(first[1].tool_results().count(), 1);

        store.add_part("msg_1", 20, text_part("prt_2", "listed the files"));
        let second = reader.read_new();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].text(), "listed the files");
        assert_eq!(second[0].tool_uses().count(), 0);
        assert!(second[0].message.usage.is_none());
        assert!(second.iter().all(|e| e.tool_results().count() == 0));

        // reset forgets what was handed out
        let replayed = reader.read_all();
        assert_eq!(replayed.len(), 2);
        assert!(replayed[0].message.usage.is_some());
        assert_eq!(replayed[1].tool_results().count(), 1);
    }

    #[test]
    fn test_history_of_touched_message_stays_hidden_after_catch_up() {
        let store = Arc::new(MemoryStore::default());
        store.add_message("msg_1", "assistant", 100, 100, json!({}));
        store.add_part("msg_1", 110, text_part("prt_1", "old reply"));

        let mut reader = OpenCodeReader::new(store.clone(), "ses_1");
        assert!(reader.read_new().is_empty());

        store.add_part("msg_1", 200, text_part("prt_2", "new reply"));
        let events = reader.read_new();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text(), "new reply");
    }
}
