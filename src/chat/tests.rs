use super::*;
use tempfile::TempDir;

#[test]
fn role_serializes_lowercase() {
    let json = serde_json::to_string(&Role::User).expect("should serialize role");
    assert_eq!(json, "\"user\"");

    let role: Role = serde_json::from_str("\"assistant\"").expect("should deserialize role");
    assert_eq!(role, Role::Assistant);
    assert_eq!(Role::System.as_str(), "system");
}

#[test]
fn message_without_context_serializes_null() {
    let message = ChatMessage::new(Role::User, "hello".to_string(), None);
    let value = serde_json::to_value(&message).expect("should serialize message");

    assert_eq!(value["role"], "user");
    assert_eq!(value["content"], "hello");
    assert!(value["context"].is_null());
    assert!(
        value["timestamp"].is_string(),
        "timestamp should serialize as an ISO-8601 string"
    );
}

#[test]
fn message_with_context_round_trips() {
    let context = vec![
        PromptMessage::system("instructions"),
        PromptMessage::user("earlier question"),
    ];
    let message = ChatMessage::new(Role::Assistant, "the answer".to_string(), Some(context));

    let json = serde_json::to_string(&message).expect("should serialize message");
    let parsed: ChatMessage = serde_json::from_str(&json).expect("should deserialize message");

    assert_eq!(parsed, message);
}

#[test]
fn history_uses_stable_field_names() {
    let history = ChatHistory {
        messages: vec![ChatMessage::new(Role::User, "hi".to_string(), None)],
        embedding_to_message_idx: vec![0],
    };

    let value = serde_json::to_value(&history).expect("should serialize history");
    assert!(value.get("messages").is_some());
    assert!(value.get("embedding_to_message_idx").is_some());
    assert_eq!(value["embedding_to_message_idx"][0], 0);
}

#[test]
fn history_round_trips_through_disk() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("nested").join("chat.json");

    let history = ChatHistory {
        messages: vec![
            ChatMessage::new(Role::User, "first".to_string(), None),
            ChatMessage::new(
                Role::Assistant,
                "second".to_string(),
                Some(vec![PromptMessage::user("first")]),
            ),
        ],
        embedding_to_message_idx: vec![0],
    };

    history.write(&path).expect("should write history");
    let loaded = ChatHistory::read(&path).expect("should read history");

    assert_eq!(loaded, history);
}

#[test]
fn history_read_reports_missing_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("absent.json");

    let result = ChatHistory::read(&path);
    assert!(matches!(result, Err(crate::ChatError::Persistence(_))));
}

#[test]
fn history_read_reports_malformed_json() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("chat.json");
    std::fs::write(&path, "{ not json").expect("should write file");

    let result = ChatHistory::read(&path);
    assert!(matches!(result, Err(crate::ChatError::Persistence(_))));
}

#[test]
fn plain_message_is_not_a_directive() {
    assert_eq!(parse_directive("hello there"), InputDirective::Plain);
    assert_eq!(parse_directive(""), InputDirective::Plain);
    assert_eq!(parse_directive("   "), InputDirective::Plain);
}

#[test]
fn trigger_must_start_the_message() {
    assert_eq!(
        parse_directive("please @ai help me"),
        InputDirective::Plain
    );
}

#[test]
fn bare_trigger_is_rejected() {
    assert_eq!(parse_directive("@ai"), InputDirective::BareTrigger);
    assert_eq!(parse_directive("  @ai  "), InputDirective::BareTrigger);
    assert_eq!(parse_directive("@AI"), InputDirective::BareTrigger);
}

#[test]
fn trigger_with_question_extracts_query() {
    assert_eq!(
        parse_directive("@ai what is rust?"),
        InputDirective::Ask("what is rust?")
    );
    assert_eq!(
        parse_directive("  @ai   spaced out   "),
        InputDirective::Ask("spaced out")
    );
}

#[test]
fn trigger_matches_case_insensitively() {
    assert_eq!(
        parse_directive("@AI what is rust?"),
        InputDirective::Ask("what is rust?")
    );
    assert_eq!(
        parse_directive("@Ai capital of France"),
        InputDirective::Ask("capital of France")
    );
}

#[test]
fn trigger_prefix_without_space_still_matches() {
    // Mirrors prefix matching: anything directly after the token
    // becomes the query.
    assert_eq!(parse_directive("@aihello"), InputDirective::Ask("hello"));
}
