use super::*;
use crate::core::chat::DEFAULT_CHAT_TITLE;
use crate::core::dispatcher::Outcome;
use crate::core::message::Sender;
use crate::core::storage::{FileStore, MemoryStore};
use crate::utils::test_utils::{spawn_stub_server, test_client, unreachable_base_url};
use tempfile::TempDir;

fn memory_app() -> App {
    let persistence = Persistence::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()));
    App::bootstrap(
        persistence,
        Dispatcher::new(test_client()),
        AppOptions::default(),
    )
}

fn file_app(dir: &std::path::Path, dispatcher: Dispatcher) -> App {
    let persistence = Persistence::new(Box::new(FileStore::new(dir)), Box::new(FileStore::new(dir)));
    App::bootstrap(persistence, dispatcher, AppOptions::default())
}

#[test]
fn bootstrap_creates_a_default_chat() {
    let app = memory_app();
    let summaries = app.chat_summaries();
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].active);
    assert_eq!(summaries[0].title, DEFAULT_CHAT_TITLE);
    assert_eq!(summaries[0].message_count, 0);
    assert_eq!(app.selected_model(), None);
}

#[test]
fn adding_and_removing_a_model_updates_catalog_and_selection() {
    let mut app = memory_app();

    assert!(app
        .add_credential(Provider::OpenAi, "gpt-x", "sk-1", "GPT X")
        .expect("add"));
    assert_eq!(
        app.catalog(),
        &[CatalogEntry {
            id: "gpt-x".to_string(),
            display_name: "GPT X".to_string(),
            provider: Provider::OpenAi,
        }]
    );
    assert_eq!(app.selected_model(), Some("gpt-x"));
    assert_eq!(
        app.active_chat().and_then(|chat| chat.model_id.as_deref()),
        Some("gpt-x")
    );

    app.add_credential(Provider::Anthropic, "claude-x", "ak-1", "Claude X")
        .expect("add");
    app.select_model("gpt-x").expect("select");

    assert!(app.remove_model("gpt-x"));
    assert!(app.registry().credential("gpt-x").is_none());
    assert!(app.registry().entry("gpt-x").is_none());
    assert_eq!(app.selected_model(), Some("claude-x"));
    assert_eq!(
        app.active_chat().and_then(|chat| chat.model_id.as_deref()),
        Some("claude-x")
    );

    assert!(app.remove_model("claude-x"));
    assert_eq!(app.selected_model(), None);
    assert!(!app.remove_model("claude-x"));
}

#[test]
fn begin_send_requires_a_model_and_text() {
    let mut app = memory_app();
    assert_eq!(app.begin_send("hi").err(), Some(SendRejected::NoModelSelected));

    app.select_model("demo-model").expect("select");
    assert_eq!(app.begin_send("   ").err(), Some(SendRejected::EmptyMessage));
    assert!(app.active_messages().is_empty());
    assert!(!app.is_busy());
}

#[test]
fn second_send_while_busy_is_a_no_op() {
    let mut app = memory_app();
    app.select_model("demo-model").expect("select");

    let pending = app.begin_send("first").expect("first send starts");
    assert!(app.is_busy());
    assert_eq!(app.begin_send("second").err(), Some(SendRejected::Busy));
    assert_eq!(app.active_messages().len(), 1);

    app.complete_send(&pending, Outcome::Reply("done".to_string()));
    assert!(!app.is_busy());
    let texts: Vec<&str> = app.active_messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "done"]);
}

#[test]
fn window_excludes_the_new_message() {
    let mut app = memory_app();
    app.select_model("demo-model").expect("select");
    for turn in 0..7 {
        let pending = app.begin_send(&format!("question {turn}")).expect("send");
        app.complete_send(&pending, Outcome::Reply(format!("answer {turn}")));
    }

    let pending = app.begin_send("last question").expect("send");
    assert_eq!(pending.window.len(), app.window_size());
    assert_eq!(
        pending.window.last().map(|m| m.text.as_str()),
        Some("answer 6")
    );
    assert!(pending.window.iter().all(|m| m.text != "last question"));
}

#[test]
fn replies_land_in_the_chat_that_sent_them() {
    let mut app = memory_app();
    app.select_model("demo-model").expect("select");
    let first = app.active_chat_id().expect("active chat");

    let pending = app.begin_send("hello").expect("send");
    let second = app.new_chat();
    assert_ne!(first, second);

    app.complete_send(&pending, Outcome::Reply("hi there".to_string()));
    assert!(app.active_messages().is_empty());
    let texts: Vec<&str> = app
        .messages(first)
        .expect("first chat")
        .iter()
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(texts, vec!["hello", "hi there"]);
}

#[test]
fn reply_for_a_deleted_chat_is_dropped() {
    let mut app = memory_app();
    app.select_model("demo-model").expect("select");
    let pending = app.begin_send("hello").expect("send");
    app.delete_chat(pending.chat_id).expect("delete");

    app.complete_send(&pending, Outcome::Reply("late".to_string()));
    assert!(!app.is_busy());
    assert!(app.chat_summaries().is_empty());
}

#[tokio::test]
async fn unconfigured_model_replies_with_a_placeholder() {
    let persistence = Persistence::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()));
    let dispatcher = Dispatcher::new(test_client())
        .with_base_url(Provider::OpenAi, unreachable_base_url().await);
    let mut app = App::bootstrap(persistence, dispatcher, AppOptions::default());
    app.select_model("demo-model").expect("select");

    let outcome = app.send("Hello").await.expect("send");
    assert!(matches!(outcome, Outcome::Placeholder(_)));
    assert!(outcome.text().contains("demo-model"));

    let messages = app.active_messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].sender, Sender::Assistant);
    assert_eq!(messages[1].model_id.as_deref(), Some("demo-model"));
}

#[tokio::test]
async fn upstream_rejection_becomes_one_assistant_message() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let (base_url, server) = spawn_stub_server("401 Unauthorized", "unauthorized").await;
    let dispatcher = Dispatcher::new(test_client()).with_base_url(Provider::OpenAi, base_url);
    let mut app = file_app(temp_dir.path(), dispatcher);
    app.add_credential(Provider::OpenAi, "gpt-x", "sk-bad", "GPT X")
        .expect("add");

    let outcome = app.send("Hello there").await.expect("send");
    server.await.expect("join").expect("request");

    assert_eq!(outcome.text(), "OpenAI API error (401): unauthorized");
    let messages = app.active_messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[0].text, "Hello there");
    assert_eq!(messages[1].sender, Sender::Assistant);
    assert_eq!(messages[1].text, "OpenAI API error (401): unauthorized");
    assert!(messages[0].id < messages[1].id);
    assert!(!app.is_busy());
}

#[test]
fn restart_restores_chats_credentials_and_selection() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let chat_id;
    {
        let mut app = file_app(temp_dir.path(), Dispatcher::new(test_client()));
        app.add_credential(Provider::Gemini, "gemini-x", "g-1", "Gemini X")
            .expect("add");
        let pending = app.begin_send("Explain quicksort in detail").expect("send");
        app.complete_send(&pending, Outcome::Reply("Sure.".to_string()));
        chat_id = pending.chat_id;
        app.new_chat();
        app.switch_chat(chat_id).expect("switch");
    }

    let app = file_app(temp_dir.path(), Dispatcher::new(test_client()));
    assert!(app.load_failures().is_empty());
    assert_eq!(app.selected_model(), Some("gemini-x"));
    assert_eq!(app.catalog().len(), 1);
    let summaries = app.chat_summaries();
    assert_eq!(summaries.len(), 2);
    let restored = summaries
        .iter()
        .find(|summary| summary.id == chat_id)
        .expect("chat restored");
    assert_eq!(restored.title, "Explain quicksort in...");
    assert_eq!(restored.message_count, 2);

    // Message ids keep increasing across restarts.
    let last_id = app.messages(chat_id).and_then(|m| m.last()).map(|m| m.id);
    let mut app = app;
    app.switch_chat(chat_id).expect("switch");
    let pending = app.begin_send("and mergesort?").expect("send");
    let new_id = app.active_messages().last().map(|m| m.id);
    assert!(new_id > last_id);
    app.complete_send(&pending, Outcome::Reply("Also sure.".to_string()));
}

#[test]
fn switching_chats_selects_their_model() {
    let mut app = memory_app();
    app.select_model("model-a").expect("select");
    let first = app.active_chat_id().expect("active");
    let pending = app.begin_send("hi").expect("send");
    app.complete_send(&pending, Outcome::Reply("hello".to_string()));

    app.new_chat();
    app.select_model("model-b").expect("select");
    assert_eq!(
        app.active_chat().and_then(|chat| chat.model_id.as_deref()),
        Some("model-b")
    );

    app.switch_chat(first).expect("switch");
    assert_eq!(app.selected_model(), Some("model-a"));
    assert_eq!(
        app.switch_chat(424242),
        Err(SessionError::UnknownChat(424242))
    );
}

#[test]
fn deleting_the_active_chat_selects_the_next_chats_model() {
    let mut app = memory_app();
    app.select_model("model-a").expect("select");
    let kept = app.active_chat_id().expect("active");
    let pending = app.begin_send("hi").expect("send");
    app.complete_send(&pending, Outcome::Reply("hello".to_string()));

    let doomed = app.new_chat();
    app.select_model("model-b").expect("select");
    app.delete_chat(doomed).expect("delete");

    assert_eq!(app.active_chat_id(), Some(kept));
    assert_eq!(app.selected_model(), Some("model-a"));

    let pending = app.begin_send("again").expect("send");
    assert_eq!(pending.model_id, "model-a");
    app.complete_send(&pending, Outcome::Reply("still here".to_string()));
    assert_eq!(
        app.active_chat().and_then(|chat| chat.model_id.as_deref()),
        Some("model-a")
    );
}

#[test]
fn deleting_an_inactive_chat_keeps_the_selection() {
    let mut app = memory_app();
    app.select_model("model-a").expect("select");
    let older = app.active_chat_id().expect("active");
    let pending = app.begin_send("hi").expect("send");
    app.complete_send(&pending, Outcome::Reply("hello".to_string()));

    app.new_chat();
    app.select_model("model-b").expect("select");
    app.delete_chat(older).expect("delete");
    assert_eq!(app.selected_model(), Some("model-b"));
}

#[test]
fn corrupt_chat_history_survives_startup() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let chats_path = temp_dir.path().join("chats.json");
    std::fs::write(&chats_path, "[{ broken").expect("write");

    let mut app = file_app(temp_dir.path(), Dispatcher::new(test_client()));
    assert_eq!(app.load_failures().len(), 1);
    assert_eq!(app.chat_summaries().len(), 1);

    app.select_model("demo-model").expect("select");
    let pending = app.begin_send("hello").expect("send");
    app.complete_send(&pending, Outcome::Reply("hi".to_string()));

    assert_eq!(
        std::fs::read_to_string(&chats_path).expect("read"),
        "[{ broken"
    );
}

#[test]
fn unreadable_credentials_keep_the_stored_catalog() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    {
        let mut app = file_app(temp_dir.path(), Dispatcher::new(test_client()));
        app.add_credential(Provider::OpenAi, "gpt-x", "sk-1", "GPT X")
            .expect("add");
    }
    let catalog_path = temp_dir.path().join("catalog.json");
    let catalog_before = std::fs::read_to_string(&catalog_path).expect("read");
    std::fs::write(temp_dir.path().join("credentials.json"), "{").expect("corrupt");

    let mut app = file_app(temp_dir.path(), Dispatcher::new(test_client()));
    assert_eq!(app.load_failures().len(), 1);
    assert!(app.catalog().is_empty());

    app.add_credential(Provider::Anthropic, "claude-x", "ak-1", "Claude X")
        .expect("add");
    assert!(!app.remove_model("gpt-x"));
    assert!(app.remove_model("claude-x"));

    assert_eq!(
        std::fs::read_to_string(&catalog_path).expect("read"),
        catalog_before
    );
}
