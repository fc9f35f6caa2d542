//! End-to-end tests: real SQLite store, the full tool registry and the
//! orchestrator, with a scripted inference service and a keyword embedder.

use std::sync::{Arc, Mutex};

use localecho_agent::Orchestrator;
use localecho_config::AppConfig;
use localecho_core::error::ProviderError;
use localecho_core::provider::{Embedder, Provider, ProviderRequest, ProviderResponse};
use localecho_core::session::SessionContext;
use localecho_core::store::{ChatLog, TaskStatus, TaskStore};
use localecho_store::SqliteStore;
use localecho_tools::{ToolDeps, default_registry};

// ── Mocks ────────────────────────────────────────────────────────────────

/// Replays scripted replies in order.
struct ScriptedProvider {
    replies: Vec<String>,
    call_count: Mutex<usize>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            call_count: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let content = self.replies.get(*count).cloned().unwrap_or_else(|| {
            panic!(
                "ScriptedProvider exhausted: call #{}, have {}",
                *count,
                self.replies.len()
            )
        });
        *count += 1;
        Ok(ProviderResponse {
            content,
            model: "e2e".into(),
            stop_reason: Some("stop".into()),
            usage: None,
        })
    }
}

/// One axis per keyword plus a small bias so no vector is all zeros.
struct KeywordEmbedder;

const AXES: [&str; 3] = ["locker", "milk", "dentist"];

#[async_trait::async_trait]
impl Embedder for KeywordEmbedder {
    fn name(&self) -> &str {
        "keywords"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let lowered = text.to_lowercase();
        let mut vector: Vec<f32> = AXES
            .iter()
            .map(|k| if lowered.contains(k) { 1.0 } else { 0.0 })
            .collect();
        vector.push(0.1);
        Ok(vector)
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    agent: Orchestrator,
    provider: Arc<ScriptedProvider>,
    store: Arc<SqliteStore>,
    archive_dir: tempfile::TempDir,
}

async fn harness_with_store(store: Arc<SqliteStore>, replies: &[&str]) -> Harness {
    let archive_dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.archive_dir = archive_dir.path().to_string_lossy().into_owned();

    let deps = ToolDeps::from_config(&config, store.clone(), Arc::new(KeywordEmbedder), None);
    let tools = Arc::new(default_registry(deps));
    let provider = Arc::new(ScriptedProvider::new(replies));
    let agent = Orchestrator::from_config(&config, provider.clone(), tools, store.clone());

    Harness {
        agent,
        provider,
        store,
        archive_dir,
    }
}

async fn harness(replies: &[&str]) -> Harness {
    let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
    harness_with_store(store, replies).await
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn model_adds_task_then_fast_paths_list_and_complete() {
    let h = harness(&[
        "Thought: the user wants a task.\nTool: add_task(\"buy milk\")",
        "Answer: Added buy milk to your list.",
    ])
    .await;
    let mut session = SessionContext::new("echo_main");

    let reply = h.agent.process_input(&mut session, "I need to buy milk later").await;
    assert_eq!(reply, "Added buy milk to your list.");
    let pending = h.store.list_tasks(Some(TaskStatus::Pending)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].description, "buy milk");

    let listed = h.agent.process_input(&mut session, "show my tasks").await;
    assert!(listed.contains("buy milk"), "got: {listed}");

    let done = h.agent.process_input(&mut session, "complete task 1").await;
    assert_eq!(done, "✅ Marked task 1 as complete.");
    assert!(h.store.list_tasks(Some(TaskStatus::Pending)).await.unwrap().is_empty());

    // Only the first exchange needed the model.
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(session.history().len(), 6);
}

#[tokio::test]
async fn remembered_fact_is_recalled_without_the_model() {
    let h = harness(&[]).await;
    let mut session = SessionContext::new("echo_main");

    let saved = h
        .agent
        .process_input(&mut session, "remember that my locker code is 4512")
        .await;
    assert!(saved.contains("Saved note ID 1"), "got: {saved}");

    let recalled = h.agent.process_input(&mut session, "what's my locker code?").await;
    assert!(recalled.contains("4512"), "got: {recalled}");
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn conversation_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("echo.db");
    let db = db.to_string_lossy();

    {
        let store = Arc::new(SqliteStore::new(&db).await.unwrap());
        let h = harness_with_store(store, &["Answer: Hi! How can I help?"]).await;
        let mut session = SessionContext::new("echo_main");
        h.agent.process_input(&mut session, "hello").await;
    }

    let store = SqliteStore::new(&db).await.unwrap();
    let session = SessionContext::restore("echo_main", &store).await.unwrap();
    let turns = session.history();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].content, "hello");
    assert_eq!(turns[1].content, "Hi! How can I help?");
}

#[tokio::test]
async fn archive_session_writes_file_and_resets_log() {
    let h = harness(&[
        "Answer: Noted.",
        "Tool: archive_session()",
        "Answer: Archived and cleared.",
    ])
    .await;
    let mut session = SessionContext::new("echo_main");

    h.agent.process_input(&mut session, "the dentist moved to friday").await;
    let reply = h.agent.process_input(&mut session, "please archive this session").await;
    assert_eq!(reply, "Archived and cleared.");

    let entries = std::fs::read_dir(h.archive_dir.path()).unwrap().count();
    assert_eq!(entries, 1);

    // Earlier turns went into the archive; only the archiving exchange remains.
    let log = h.store.all_turns(Some("echo_main")).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].content, "please archive this session");
}

#[tokio::test]
async fn unknown_tool_is_fed_back_and_model_recovers() {
    let h = harness(&[
        "Tool: fly_to_moon(\"now\")",
        "Answer: I can't do that, but I can help with tasks and notes.",
    ])
    .await;
    let mut session = SessionContext::new("echo_main");

    let reply = h.agent.process_input(&mut session, "fly me to the moon").await;
    assert_eq!(reply, "I can't do that, but I can help with tasks and notes.");
    assert_eq!(h.provider.calls(), 2);
}
