//! Chat management commands shared by the CLI and the interactive loop.

use std::error::Error;

use chrono::Local;

use crate::core::app::{App, ChatSummary};

pub fn list_chats(app: &App) {
    let summaries = app.chat_summaries();
    if summaries.is_empty() {
        println!("No chats yet. Start one with 'confab new' or just say something.");
        return;
    }
    for summary in &summaries {
        println!("{}", format_summary(app, summary));
    }
}

pub fn format_summary(app: &App, summary: &ChatSummary) -> String {
    let marker = if summary.active { "*" } else { " " };
    let model = summary
        .model_id
        .as_deref()
        .map(|id| app.model_display_name(id))
        .unwrap_or("no model");
    let noun = if summary.message_count == 1 {
        "message"
    } else {
        "messages"
    };
    format!(
        "{marker} {}  {}  ({} {noun}, {model}, {})",
        summary.id,
        summary.title,
        summary.message_count,
        summary
            .updated_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
    )
}

pub fn new_chat(app: &mut App) {
    let id = app.new_chat();
    println!("✅ Active chat: {id}");
}

pub fn switch_chat(app: &mut App, id: u64) -> Result<(), Box<dyn Error>> {
    app.switch_chat(id)?;
    let title = app
        .active_chat()
        .map(|chat| chat.title.clone())
        .unwrap_or_default();
    println!("✅ Switched to {id}: {title}");
    Ok(())
}

pub fn rename_chat(app: &mut App, id: u64, title: &str) -> Result<(), Box<dyn Error>> {
    app.rename_chat(id, title)?;
    println!("✅ Renamed {id} to {}", title.trim());
    Ok(())
}

pub fn delete_chat(app: &mut App, id: u64) -> Result<(), Box<dyn Error>> {
    app.delete_chat(id)?;
    println!("✅ Deleted {id}");
    Ok(())
}
