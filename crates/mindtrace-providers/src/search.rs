use mindtrace_types::{CanonicalEvent, single_line, truncate};

use crate::traits::SearchHit;

const SNIPPET_RADIUS: usize = 60;

/// Case-insensitive substring search over the searchable text of each event
///
/// Matches text, thinking, tool inputs and tool result content. At most one
/// hit per event; at most `limit` hits overall, in event order.
pub fn search_events(events: &[CanonicalEvent], query: &str, limit: usize) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for event in events {
        let haystack = single_line(
            &event
                .message
                .content
                .iter()
                .map(|block| block.searchable_text())
                .collect::<Vec<_>>()
                .join(" "),
        );
        if let Some(snippet) = snippet_around(&haystack, &needle) {
            hits.push(SearchHit {
                timestamp: event.timestamp,
                role: event.message.role,
                snippet,
            });
            if hits.len() >= limit {
                break;
            }
        }
    }
    hits
}

fn snippet_around(text: &str, needle: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let lower: Vec<char> = chars.iter().flat_map(|c| c.to_lowercase()).collect();
    // to_lowercase can change char counts; fall back to a prefix snippet then
    let needle_chars: Vec<char> = needle.chars().collect();
    let pos = lower
        .windows(needle_chars.len())
        .position(|w| w == needle_chars.as_slice())?;

    if lower.len() != chars.len() {
        return Some(truncate(text, SNIPPET_RADIUS * 2));
    }

    let start = pos.saturating_sub(SNIPPET_RADIUS);
    let end = (pos + needle_chars.len() + SNIPPET_RADIUS).min(chars.len());
    let mut snippet: String = chars[start..end].iter().collect();
    if start > 0 {
        snippet.insert_str(0, "...");
    }
    if end < chars.len() {
        snippet.push_str("...");
    }
    Some(snippet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mindtrace_types::{ContentBlock, Role};
    use serde_json::json;

    fn events() -> Vec<CanonicalEvent> {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        vec![
            CanonicalEvent::user("u1", ts, vec![ContentBlock::text("Please fix the Parser bug")]),
            CanonicalEvent::assistant(
                "a1",
                ts,
                None,
                None,
                vec![ContentBlock::tool_use("t1", "Read", json!({"file_path": "src/parser.rs"}))],
            ),
            CanonicalEvent::user(
                "u2",
                ts,
                vec![ContentBlock::tool_result("t1", "fn parse() {}", false, None)],
            ),
        ]
    }

    #[test]
    fn test_case_insensitive_across_blocks() {
        let hits = search_events(&events(), "PARSER", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].role, Role::User);
        assert!(hits[0].snippet.contains("Parser bug"));
        assert_eq!(hits[1].role, Role::Assistant);
    }

    #[test]
    fn test_limit_bounds_hits() {
        assert_eq!(search_events(&events(), "pars", 1).len(), 1);
        assert!(search_events(&events(), "pars", 0).is_empty());
        assert!(search_events(&events(), "   ", 10).is_empty());
    }

    #[test]
    fn test_long_text_snippet_is_windowed() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let text = format!("{} needle {}", "x".repeat(200), "y".repeat(200));
        let events = [CanonicalEvent::user("u", ts, vec![ContentBlock::text(text)])];
        let hits = search_events(&events, "needle", 5);
        let snippet = &hits[0].snippet;
        assert!(snippet.starts_with("...") && snippet.ends_with("..."));
        assert!(snippet.contains("needle"));
        assert!(snippet.chars().count() < 150);
    }
}
