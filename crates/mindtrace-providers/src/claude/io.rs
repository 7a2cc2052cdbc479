use mindtrace_types::{single_line, truncate};
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::schema::{ClaudeRecord, UserContent};

const HEADER_LINES: usize = 200;
pub(crate) const LABEL_MAX_CHARS: usize = 80;

#[derive(Debug, Default, Clone)]
pub struct ClaudeHeader {
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub summary: Option<String>,
    pub first_prompt: Option<String>,
}

impl ClaudeHeader {
    /// Summary text if the session was ever summarized, else the first prompt
    pub fn label(&self) -> Option<String> {
        self.summary
            .as_deref()
            .or(self.first_prompt.as_deref())
            .map(|text| truncate(&single_line(text), LABEL_MAX_CHARS))
            .filter(|label| !label.is_empty())
    }
}

/// Scan the head of a session file for id, cwd and label material
pub fn extract_claude_header(path: &Path) -> std::io::Result<ClaudeHeader> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut header = ClaudeHeader::default();
    let mut meta_ids: HashSet<String> = HashSet::new();

    for line in reader.lines().take(HEADER_LINES).map_while(|l| l.ok()) {
        let Ok(record) = serde_json::from_str::<ClaudeRecord>(&line) else {
            continue;
        };

        if header.session_id.is_none() {
            header.session_id = record.session_id().map(str::to_string);
        }
        if header.cwd.is_none() {
            header.cwd = record.cwd().map(str::to_string);
        }

        match record {
            ClaudeRecord::Summary(s) if header.summary.is_none() => {
                header.summary = Some(s.summary);
            }
            ClaudeRecord::User(user) => {
                // Meta messages (command caveats, hook output) and their replies are not prompts
                let parent_is_meta = user
                    .parent_uuid
                    .as_ref()
                    .is_some_and(|p| meta_ids.contains(p));
                if user.is_meta || parent_is_meta {
                    meta_ids.insert(user.uuid.clone());
                    continue;
                }
                if header.first_prompt.is_none() {
                    header.first_prompt = user.message.content.iter().find_map(|c| match c {
                        UserContent::Text { text } if !text.trim().is_empty() => Some(text.clone()),
                        _ => None,
                    });
                }
            }
            _ => {}
        }

        if header.session_id.is_some() && header.cwd.is_some() && header.summary.is_some() {
            break;
        }
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::io::Write;

    fn write_lines(lines: &[Value]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_header_skips_meta_chain() {
        let file = write_lines(&[
            json!({"type": "user", "uuid": "m1", "sessionId": "s", "cwd": "/w",
                "timestamp": "2025-01-01T00:00:00Z", "isMeta": true,
                "message": {"content": "<caveat>"}}),
            json!({"type": "user", "uuid": "m2", "parentUuid": "m1", "sessionId": "s",
                "timestamp": "2025-01-01T00:00:01Z", "message": {"content": "/clear"}}),
            json!({"type": "user", "uuid": "u1", "parentUuid": "m2", "sessionId": "s",
                "timestamp": "2025-01-01T00:00:02Z", "message": {"content": "stale"}}),
            json!({"type": "user", "uuid": "u2", "sessionId": "s",
                "timestamp": "2025-01-01T00:00:03Z",
                "message": {"content": "Refactor the   parser\nplease"}}),
        ]);
        let header = extract_claude_header(file.path()).unwrap();
        assert_eq!(header.session_id.as_deref(), Some("s"));
        assert_eq!(header.cwd.as_deref(), Some("/w"));
        assert_eq!(header.label().as_deref(), Some("Refactor the parser please"));
    }

    #[test]
    fn test_summary_wins_label() {
        let file = write_lines(&[
            json!({"type": "summary", "summary": "Parser refactor", "leafUuid": "x"}),
            json!({"type": "user", "uuid": "u1", "sessionId": "s",
                "timestamp": "2025-01-01T00:00:00Z", "message": {"content": "first"}}),
        ]);
        let header = extract_claude_header(file.path()).unwrap();
        assert_eq!(header.label().as_deref(), Some("Parser refactor"));
    }

    #[test]
    fn test_long_label_truncated() {
        let long = "x".repeat(200);
        let line = json!({"type": "user", "uuid": "u1", "sessionId": "s",
            "timestamp": "2025-01-01T00:00:00Z", "message": {"content": long}});
        let file = write_lines(&[line]);
        let label = extract_claude_header(file.path()).unwrap().label().unwrap();
        assert_eq!(label.chars().count(), LABEL_MAX_CHARS + 3);
    }
}
