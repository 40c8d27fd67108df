//! End-to-end tests for the agent loop with a scripted provider

mod common;

use common::{server_error, text_reply, tool_reply, RecordingConsole, ScriptedProvider};
use filepilot_agent::{AgentLoop, RetryPolicy, ToolRegistry, TurnOutcome};
use filepilot_provider::{parse_response, Message, Role, ToolCall};
use serde_json::json;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};

fn agent_in(dir: &TempDir, responses: Vec<filepilot_provider::Result<filepilot_provider::ChatResponse>>) -> AgentLoop<ScriptedProvider> {
    AgentLoop::new(
        ScriptedProvider::new(responses),
        ToolRegistry::with_default_tools(dir.path()),
        "system prompt",
    )
}

/// Every tool-calling assistant message is followed by exactly its results
fn assert_well_formed(messages: &[Message]) {
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[1..].iter().all(|m| m.role != Role::System));

    let mut i = 1;
    while i < messages.len() {
        let message = &messages[i];
        if message.role == Role::Assistant && message.has_tool_calls() {
            for (offset, call) in message.tool_calls().iter().enumerate() {
                let result = &messages[i + 1 + offset];
                assert_eq!(result.role, Role::Tool);
                assert_eq!(result.tool_call_id.as_deref(), Some(call.id.as_str()));
            }
            i += 1 + message.tool_calls().len();
        } else {
            assert_ne!(message.role, Role::Tool, "orphan tool message at {}", i);
            i += 1;
        }
    }
}

#[tokio::test]
async fn test_plain_reply_completes_turn() {
    let dir = TempDir::new().unwrap();
    let mut agent = agent_in(&dir, vec![text_reply("Hello there")]);
    let mut console = RecordingConsole::default();

    let outcome = agent.run_turn("hi", &mut console).await.unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(console.lines, vec!["reply: Hello there"]);
    assert_eq!(agent.conversation().len(), 3);
    assert_eq!(agent.provider().tool_counts(), vec![3]);
}

#[tokio::test]
async fn test_list_files_turn() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("main.go"), "package main").unwrap();
    fs::create_dir(dir.path().join("tools")).unwrap();

    let mut agent = agent_in(
        &dir,
        vec![
            tool_reply(vec![ToolCall::function("call_1", "list_files", "{}")]),
            text_reply("There is main.go and a tools directory."),
        ],
    );
    let mut console = RecordingConsole::default();

    let outcome = agent
        .run_turn("what files are here?", &mut console)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    let messages = agent.conversation().messages();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[3].role, Role::Tool);
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(messages[3].content.as_deref(), Some(r#"["main.go","tools/"]"#));
    assert_well_formed(messages);

    let requests = agent.provider().requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].len(), 4);

    assert_eq!(
        console.lines,
        vec![
            "tool: list_files({})".to_string(),
            "reply: There is main.go and a tools directory.".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_multi_round_edit_turn() {
    let dir = TempDir::new().unwrap();
    let create = json!({"path": "hello.txt", "old_str": "", "new_str": "hello"}).to_string();
    let fix = json!({"path": "hello.txt", "old_str": "hello", "new_str": "hello, world"}).to_string();

    let mut agent = agent_in(
        &dir,
        vec![
            tool_reply(vec![ToolCall::function("a", "edit_file", create)]),
            tool_reply(vec![
                ToolCall::function("b", "edit_file", fix),
                ToolCall::function("c", "read_file", json!({"path": "hello.txt"}).to_string()),
            ]),
            text_reply("Done."),
        ],
    );
    let mut console = RecordingConsole::default();

    agent.run_turn("make a greeting", &mut console).await.unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("hello.txt")).unwrap(),
        "hello, world"
    );
    let messages = agent.conversation().messages();
    assert_eq!(messages.len(), 8);
    assert_eq!(messages[6].content.as_deref(), Some("hello, world"));
    assert_well_formed(messages);
}

#[tokio::test]
async fn test_transport_failure_retries_with_same_request() {
    let dir = TempDir::new().unwrap();
    let mut agent = agent_in(&dir, vec![server_error(), text_reply("recovered")]);
    let mut console = RecordingConsole::default();

    let outcome = agent.run_turn("hi", &mut console).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    let requests = agent.provider().requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
    assert_eq!(requests[0].len(), 2);

    assert_eq!(agent.conversation().len(), 3);
    assert!(console.lines[0].starts_with("failed #1: API request failed with status 500"));
    assert_eq!(console.lines[1], "reply: recovered");
}

#[tokio::test]
async fn test_bounded_retry_abandons_turn() {
    let dir = TempDir::new().unwrap();
    let mut agent = agent_in(
        &dir,
        vec![server_error(), server_error(), text_reply("next turn")],
    )
    .with_retry_policy(RetryPolicy::bounded(1, Duration::from_millis(1)));
    let mut console = RecordingConsole::default();

    let outcome = agent.run_turn("first", &mut console).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Abandoned { attempts: 2 });
    assert_eq!(
        console.lines,
        vec![
            "failed #1: API request failed with status 500: upstream exploded".to_string(),
            "retrying in 1ms".to_string(),
            "failed #2: API request failed with status 500: upstream exploded".to_string(),
            "abandoned after 2".to_string(),
        ]
    );

    // The unanswered user message stays; the next turn starts from it
    assert_eq!(agent.conversation().len(), 2);
    let outcome = agent.run_turn("second", &mut console).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(agent.conversation().len(), 4);
}

#[tokio::test]
async fn test_non_function_calls_are_dropped() {
    let dir = TempDir::new().unwrap();
    let mut retrieval = ToolCall::function("r1", "read_file", "{}");
    retrieval.call_type = "retrieval".to_string();

    let mut agent = agent_in(
        &dir,
        vec![
            tool_reply(vec![retrieval.clone(), ToolCall::function("f1", "list_files", "{}")]),
            tool_reply(vec![retrieval]),
            text_reply("ok"),
        ],
    );
    let mut console = RecordingConsole::default();

    agent.run_turn("go", &mut console).await.unwrap();

    let messages = agent.conversation().messages();
    assert_eq!(messages[2].tool_calls().len(), 1);
    assert_eq!(messages[2].tool_calls()[0].id, "f1");
    assert_well_formed(messages);
    // A reply made only of non-function calls ends the turn
    assert!(!messages.last().unwrap().has_tool_calls());
    assert_eq!(agent.provider().remaining(), 1);
}

#[tokio::test]
async fn test_tool_call_without_type_is_not_dispatched() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("secret.txt"), "hidden").unwrap();
    let untyped = parse_response(
        &json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "checking",
                    "tool_calls": [{
                        "id": "u1",
                        "function": {"name": "read_file", "arguments": "{\"path\":\"secret.txt\"}"}
                    }]
                }
            }]
        })
        .to_string(),
    );

    let mut agent = agent_in(&dir, vec![untyped, text_reply("unused")]);
    let mut console = RecordingConsole::default();

    let outcome = agent.run_turn("read it", &mut console).await.unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(console.lines, vec!["reply: checking"]);
    let messages = agent.conversation().messages();
    assert_eq!(messages.len(), 3);
    assert!(!messages[2].has_tool_calls());
    assert_eq!(agent.provider().remaining(), 1);
}

#[tokio::test]
async fn test_run_skips_blank_lines_and_stops_at_eof() {
    let dir = TempDir::new().unwrap();
    let mut agent = agent_in(&dir, vec![text_reply("one"), text_reply("two")]);
    let mut console = RecordingConsole::default();
    let mut input = BufReader::new(&b"first\n   \n\nsecond\n"[..]).lines();

    agent.run(&mut input, &mut console).await.unwrap();

    assert_eq!(console.lines, vec!["reply: one", "reply: two"]);
    assert_eq!(console.prompts, 5);

    let users: Vec<_> = agent
        .conversation()
        .messages()
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.clone().unwrap())
        .collect();
    assert_eq!(users, vec!["first", "second"]);
    assert_well_formed(agent.conversation().messages());
}
