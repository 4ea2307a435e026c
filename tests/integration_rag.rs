#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end pipeline tests with deterministic stub providers.
// Run with: cargo test --test integration_rag

use rag_chat::ChatError;
use rag_chat::chat::store::ConversationStore;
use rag_chat::chat::{ChatHistory, PromptMessage, Role};
use rag_chat::commands::{TurnOutcome, run_turn};
use rag_chat::generator::ResponseGenerator;
use rag_chat::providers::{CompletionProvider, EmbeddingProvider};
use rag_chat::retrieval::RetrievalEngine;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const DIMENSION: usize = 3;

/// Deterministic embedder: canned vectors for known texts, a stable
/// byte-derived vector for everything else.
struct StubEmbedder {
    canned: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    fn new(canned: &[(&str, [f32; 3])]) -> Self {
        Self {
            canned: canned
                .iter()
                .map(|(text, vector)| ((*text).to_string(), vector.to_vec()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for StubEmbedder {
    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed(&self, text: &str) -> rag_chat::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(vector) = self.canned.get(text) {
            return Ok(vector.clone());
        }

        let mut vector = vec![0.0_f32; DIMENSION];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % DIMENSION] += f32::from(byte);
        }
        Ok(vector)
    }
}

struct StubCompleter {
    reply: String,
    calls: AtomicUsize,
}

impl StubCompleter {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionProvider for StubCompleter {
    fn complete(&self, _messages: &[PromptMessage]) -> rag_chat::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

struct FailingCompleter;

impl CompletionProvider for FailingCompleter {
    fn complete(&self, _messages: &[PromptMessage]) -> rag_chat::Result<String> {
        Err(ChatError::Completion("model unavailable".to_string()))
    }
}

fn chat_path(dir: &TempDir) -> PathBuf {
    dir.path().join("chat_test.json")
}

#[test]
fn triggered_question_retrieves_notes_and_stores_the_prompt() {
    let dir = TempDir::new().expect("should create temp dir");
    let embedder = Arc::new(StubEmbedder::new(&[
        ("The capital of France is Paris.", [0.0, 1.0, 0.0]),
        ("I like trains.", [0.0, 0.0, 1.0]),
        ("@ai What is the capital of France?", [0.0, 0.95, 0.05]),
        ("What is the capital of France?", [0.0, 0.9, 0.1]),
    ]));
    let completer = Arc::new(StubCompleter::new("Paris."));

    let mut store = ConversationStore::new(chat_path(&dir), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let engine = RetrievalEngine::new(Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let generator = ResponseGenerator::new(Arc::clone(&completer) as Arc<dyn CompletionProvider>);

    store
        .append(Role::User, "The capital of France is Paris.", None)
        .expect("should append note");
    store
        .append(Role::User, "I like trains.", None)
        .expect("should append note");

    let outcome = run_turn(
        &mut store,
        &engine,
        &generator,
        2,
        "@ai What is the capital of France?",
    )
    .expect("turn should succeed");

    assert_eq!(
        outcome,
        TurnOutcome::Answered {
            answer: "Paris.".to_string()
        }
    );

    let messages = store.all_messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].role, Role::User);
    assert_eq!(messages[2].content, "@ai What is the capital of France?");
    assert_eq!(messages[3].role, Role::Assistant);
    assert_eq!(messages[3].content, "Paris.");

    // The question itself is embedded before retrieval runs, so it is
    // its own nearest neighbor and leads the retrieved context.
    let prompt = messages[3]
        .context
        .as_ref()
        .expect("answer should record its prompt");
    assert_eq!(prompt.len(), 4);
    assert_eq!(prompt[0].role, Role::System);
    assert_eq!(prompt[1].role, Role::User);
    assert_eq!(prompt[1].content, "@ai What is the capital of France?");
    assert_eq!(prompt[2].role, Role::User);
    assert_eq!(prompt[2].content, "The capital of France is Paris.");
    assert_eq!(prompt[3].role, Role::User);
    assert_eq!(prompt[3].content, "What is the capital of France?");

    assert_eq!(completer.call_count(), 1);
}

#[test]
fn nearest_note_wins_with_top_k_one() {
    let dir = TempDir::new().expect("should create temp dir");
    let embedder = Arc::new(StubEmbedder::new(&[
        ("Hello", [1.0, 0.0, 0.0]),
        ("What is the capital of France?", [0.0, 1.0, 0.0]),
        ("capital of France", [0.0, 0.9, 0.1]),
    ]));

    let mut store = ConversationStore::new(chat_path(&dir), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let engine = RetrievalEngine::new(Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);

    store
        .append(Role::User, "Hello", None)
        .expect("should append note");
    store
        .append(Role::User, "What is the capital of France?", None)
        .expect("should append note");

    let context = engine
        .retrieve_context(&store, "capital of France", 1)
        .expect("retrieval should succeed");

    assert_eq!(context.len(), 1);
    assert_eq!(context[0].role, Role::User);
    assert_eq!(context[0].content, "What is the capital of France?");
}

#[test]
fn bare_trigger_is_rejected_without_touching_the_store() {
    let dir = TempDir::new().expect("should create temp dir");
    let embedder = Arc::new(StubEmbedder::new(&[]));
    let completer = Arc::new(StubCompleter::new("unused"));

    let mut store = ConversationStore::new(chat_path(&dir), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let engine = RetrievalEngine::new(Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let generator = ResponseGenerator::new(Arc::clone(&completer) as Arc<dyn CompletionProvider>);

    for input in ["@ai", "  @AI  ", "@Ai"] {
        let outcome =
            run_turn(&mut store, &engine, &generator, 10, input).expect("turn should succeed");
        assert_eq!(outcome, TurnOutcome::NeedsQuery);
    }

    assert!(store.all_messages().is_empty());
    assert_eq!(embedder.call_count(), 0);
    assert_eq!(completer.call_count(), 0);
    assert!(!chat_path(&dir).exists());
}

#[test]
fn plain_notes_are_stored_verbatim_and_never_answered() {
    let dir = TempDir::new().expect("should create temp dir");
    let embedder = Arc::new(StubEmbedder::new(&[]));
    let completer = Arc::new(StubCompleter::new("unused"));

    let mut store = ConversationStore::new(chat_path(&dir), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let engine = RetrievalEngine::new(Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let generator = ResponseGenerator::new(Arc::clone(&completer) as Arc<dyn CompletionProvider>);

    let outcome = run_turn(&mut store, &engine, &generator, 10, "Remember to buy milk")
        .expect("turn should succeed");
    assert_eq!(outcome, TurnOutcome::Stored);

    let outcome = run_turn(&mut store, &engine, &generator, 10, "ai is interesting")
        .expect("turn should succeed");
    assert_eq!(outcome, TurnOutcome::Stored);

    let messages = store.all_messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|message| message.role == Role::User));
    assert_eq!(messages[0].content, "Remember to buy milk");

    assert_eq!(completer.call_count(), 0);
    assert_eq!(embedder.call_count(), 2);
}

#[test]
fn first_question_retrieves_only_itself_as_context() {
    let dir = TempDir::new().expect("should create temp dir");
    let embedder = Arc::new(StubEmbedder::new(&[
        ("@ai hello", [1.0, 0.0, 0.0]),
        ("hello", [0.9, 0.1, 0.0]),
    ]));
    let completer = Arc::new(StubCompleter::new("Hi there."));

    let mut store = ConversationStore::new(chat_path(&dir), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let engine = RetrievalEngine::new(Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let generator = ResponseGenerator::new(Arc::clone(&completer) as Arc<dyn CompletionProvider>);

    let outcome =
        run_turn(&mut store, &engine, &generator, 10, "@ai hello").expect("turn should succeed");
    assert!(matches!(outcome, TurnOutcome::Answered { .. }));

    let messages = store.all_messages();
    assert_eq!(messages.len(), 2);

    let prompt = messages[1]
        .context
        .as_ref()
        .expect("answer should record its prompt");
    assert_eq!(prompt.len(), 3);
    assert_eq!(prompt[0].role, Role::System);
    assert_eq!(prompt[1].content, "@ai hello");
    assert_eq!(prompt[2].content, "hello");
}

#[test]
fn failed_completion_keeps_the_question() {
    let dir = TempDir::new().expect("should create temp dir");
    let embedder = Arc::new(StubEmbedder::new(&[]));

    let mut store = ConversationStore::new(chat_path(&dir), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let engine = RetrievalEngine::new(Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let generator = ResponseGenerator::new(Arc::new(FailingCompleter));

    let result = run_turn(&mut store, &engine, &generator, 10, "@ai does this survive?");
    assert!(matches!(result, Err(ChatError::Completion(_))));

    let messages = store.all_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "@ai does this survive?");

    let history = ChatHistory::read(&chat_path(&dir)).expect("artifact should exist");
    assert_eq!(history.messages.len(), 1);
}

#[test]
fn chat_survives_restart_and_keeps_answering() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = chat_path(&dir);
    let canned: &[(&str, [f32; 3])] = &[
        ("The capital of France is Paris.", [0.0, 1.0, 0.0]),
        ("I like trains.", [0.0, 0.0, 1.0]),
        ("@ai What is the capital of France?", [0.0, 0.95, 0.05]),
        ("What is the capital of France?", [0.0, 0.9, 0.1]),
    ];

    {
        let embedder = Arc::new(StubEmbedder::new(canned));
        let mut store = ConversationStore::new(path.clone(), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
        store
            .append(Role::User, "The capital of France is Paris.", None)
            .expect("should append note");
        store
            .append(Role::User, "I like trains.", None)
            .expect("should append note");
    }

    let embedder = Arc::new(StubEmbedder::new(canned));
    let completer = Arc::new(StubCompleter::new("Paris."));
    let mut store = ConversationStore::open(path.clone(), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    assert_eq!(store.index_coverage(), (2, 2));

    let engine = RetrievalEngine::new(Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let generator = ResponseGenerator::new(Arc::clone(&completer) as Arc<dyn CompletionProvider>);

    let outcome = run_turn(
        &mut store,
        &engine,
        &generator,
        1,
        "@ai What is the capital of France?",
    )
    .expect("turn should succeed");
    assert!(matches!(outcome, TurnOutcome::Answered { .. }));
    assert_eq!(store.all_messages().len(), 4);

    let history = ChatHistory::read(&path).expect("artifact should exist");
    assert_eq!(history.messages.len(), 4);
    assert_eq!(history.embedding_to_message_idx, vec![0, 1, 2]);
}

#[test]
fn clearing_a_chat_removes_the_artifact() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = chat_path(&dir);
    let embedder = Arc::new(StubEmbedder::new(&[]));
    let completer = Arc::new(StubCompleter::new("unused"));

    let mut store = ConversationStore::new(path.clone(), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let engine = RetrievalEngine::new(Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    let generator = ResponseGenerator::new(Arc::clone(&completer) as Arc<dyn CompletionProvider>);

    run_turn(&mut store, &engine, &generator, 10, "a note to keep")
        .expect("turn should succeed");
    assert!(path.exists());

    store.clear();
    assert!(store.all_messages().is_empty());
    assert!(!path.exists());

    let reopened = ConversationStore::open(path, Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>);
    assert!(reopened.all_messages().is_empty());
}
