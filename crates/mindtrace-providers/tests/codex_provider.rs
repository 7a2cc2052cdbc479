use mindtrace_providers::{CodexProvider, Provider};
use mindtrace_testing::TestWorld;
use mindtrace_testing::fixtures::codex;
use mindtrace_types::ContentBlock;
use serde_json::{Value, json};

const SESSION: &str = "0197a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b";
const REVIEW: &str = "0197a1b2-0000-7e5f-8a9b-0c1d2e3f4a5b";
const SPAWNED: &str = "0197a1b2-1111-7e5f-8a9b-0c1d2e3f4a5b";
const STRANGER: &str = "0197a1b2-2222-7e5f-8a9b-0c1d2e3f4a5b";

fn parent_lines(world: &TestWorld) -> Vec<String> {
    let ws = world.workspace();
    vec![
        codex::session_meta("2025-06-01T10:00:00Z", SESSION, ws, json!("cli")),
        codex::turn_context("2025-06-01T10:00:00Z", ws, "gpt-5-codex"),
        codex::user_message(
            "2025-06-01T10:00:01Z",
            "<environment_context>cwd</environment_context>",
        ),
        codex::user_message("2025-06-01T10:00:02Z", "list the files"),
        codex::exec_begin("2025-06-01T10:00:03Z", "call_1", &["bash", "-lc", "ls"]),
        codex::exec_end("2025-06-01T10:00:04Z", "call_1", 0, "a.txt"),
        codex::token_count("2025-06-01T10:00:05Z", 1200, 40, Some(272_000)),
    ]
}

#[test]
fn test_exec_pair_with_model_from_turn_context() {
    let world = TestWorld::new();
    world
        .codex()
        .write_rollout("2025/06/01", "2025-06-01T10-00-00", SESSION, &parent_lines(&world))
        .unwrap();

    let provider = CodexProvider::from_paths(&world.provider_paths());
    let session = provider.find_active_session(world.workspace()).unwrap();
    assert_eq!(session.id, SESSION);
    assert_eq!(provider.session_label(&session).as_deref(), Some("list the files"));

    let mut reader = provider.create_reader(&session);
    let events = reader.read_all();
    let call = events.iter().find(|e| e.tool_uses().next().is_some()).unwrap();
    let (id, name, input) = call.tool_uses().next().unwrap();
    assert_eq!((id, name), ("call_1", "Bash"));
    assert_eq!(input["command"], "ls");
    assert_eq!(call.message.model.as_deref(), Some("gpt-5-codex"));

    let result = events.iter().find(|e| e.tool_results().next().is_some()).unwrap();
    assert_eq!(
        result.tool_results().next(),
        Some(&ContentBlock::tool_result("call_1", "a.txt", false, Some(1000)))
    );
    assert_eq!(reader.reported_context_window(), Some(272_000));
}

#[test]
fn test_index_preferred_over_scan() {
    let world = TestWorld::new();
    let ws = world.workspace();
    let rollout = world
        .codex()
        .write_rollout("2025/06/01", "2025-06-01T10-00-00", SESSION, &parent_lines(&world))
        .unwrap();
    world
        .codex()
        .write_index(&[("thread-from-index", rollout.as_path(), ws, 1_750_000_000)])
        .unwrap();

    let provider = CodexProvider::from_paths(&world.provider_paths());
    let sessions = provider.find_all_sessions(ws);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "thread-from-index");
    assert_eq!(sessions[0].path, rollout);
}

#[test]
fn test_unreadable_index_falls_back_to_scan() {
    let world = TestWorld::new();
    world
        .codex()
        .write_rollout("2025/06/01", "2025-06-01T10-00-00", SESSION, &parent_lines(&world))
        .unwrap();
    let conn = rusqlite::Connection::open(world.codex_root().join("state.sqlite")).unwrap();
    conn.execute_batch("CREATE TABLE threads (name TEXT);").unwrap();
    drop(conn);

    let provider = CodexProvider::from_paths(&world.provider_paths());
    let sessions = provider.find_all_sessions(world.workspace());
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, SESSION);
}

#[test]
fn test_subagents_linked_explicitly_or_by_review_spawn() {
    let world = TestWorld::new();
    let ws = world.workspace();
    let fixture = world.codex();

    let mut parent = parent_lines(&world);
    parent.push(codex::entered_review_mode("2025-06-01T10:01:00.000Z"));
    fixture
        .write_rollout("2025/06/01", "2025-06-01T10-00-00", SESSION, &parent)
        .unwrap();

    fixture
        .write_rollout(
            "2025/06/01",
            "2025-06-01T10-01-00",
            REVIEW,
            &[
                codex::session_meta(
                    "2025-06-01T10:01:00.050Z",
                    REVIEW,
                    ws,
                    json!({"subagent": "review"}),
                ),
                codex::user_message("2025-06-01T10:01:00.060Z", "Review the working tree"),
            ],
        )
        .unwrap();
    fixture
        .write_rollout(
            "2025/06/01",
            "2025-06-01T10-05-00",
            SPAWNED,
            &[
                codex::session_meta(
                    "2025-06-01T10:05:00Z",
                    SPAWNED,
                    ws,
                    json!({
                        "subagent": {"thread_spawn": {"parent_thread_id": SESSION, "depth": 1}}
                    }),
                ),
                codex::user_message("2025-06-01T10:05:01Z", "Write the migration"),
            ],
        )
        .unwrap();
    fixture
        .write_rollout(
            "2025/06/01",
            "2025-06-01T11-00-00",
            STRANGER,
            &[codex::session_meta(
                "2025-06-01T11:00:00Z",
                STRANGER,
                ws,
                json!({"subagent": "review"}),
            )],
        )
        .unwrap();

    let provider = CodexProvider::from_paths(&world.provider_paths());
    let sessions = provider.find_all_sessions(ws);
    assert_eq!(sessions.len(), 1, "subagent rollouts are not top-level sessions");

    let forks = provider.scan_subagents(&sessions[0]);
    let summary: Vec<(&str, Option<&str>, Option<&str>)> = forks
        .iter()
        .map(|f| (f.id.as_str(), f.agent_type.as_deref(), f.description.as_deref()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (REVIEW, Some("review"), Some("Review the working tree")),
            (SPAWNED, Some("thread_spawn"), Some("Write the migration")),
        ]
    );
    assert!(forks.iter().all(|f| !f.events.is_empty()));
}

#[test]
fn test_truncated_rollout_is_reread() {
    let world = TestWorld::new();
    let path = world
        .codex()
        .write_rollout("2025/06/01", "2025-06-01T10-00-00", SESSION, &parent_lines(&world))
        .unwrap();

    let provider = CodexProvider::from_paths(&world.provider_paths());
    let session = provider.find_active_session(world.workspace()).unwrap();
    let mut reader = provider.create_reader(&session);
    assert!(!reader.read_new().is_empty());

    let ws = world.workspace();
    mindtrace_testing::fixtures::write_jsonl(
        &path,
        &[
            codex::session_meta("2025-06-01T12:00:00Z", SESSION, ws, Value::Null),
            codex::user_message("2025-06-01T12:00:01Z", "new"),
        ],
    )
    .unwrap();

    let events = reader.read_new();
    assert!(reader.was_truncated());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].text(), "new");
}
