use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::core::message::Message;

pub const DEFAULT_CHAT_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 20;
const TITLE_ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    /// No messages yet.
    Empty,
    /// Has messages but still carries the default title.
    Active,
    /// Title was derived from the conversation or set by the user.
    Titled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub model_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(id: u64, model_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: DEFAULT_CHAT_TITLE.to_string(),
            messages: Vec::new(),
            model_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// State as stored. For the active chat, prefer
    /// [`SessionStore::state`](crate::core::session::SessionStore::state),
    /// which sees messages not yet flushed.
    pub fn state(&self) -> ChatState {
        self.state_for(&self.messages)
    }

    /// State given a transcript that may be newer than `self.messages`.
    pub fn state_for(&self, messages: &[Message]) -> ChatState {
        if messages.is_empty() {
            ChatState::Empty
        } else if self.has_default_title() {
            ChatState::Active
        } else {
            ChatState::Titled
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_CHAT_TITLE
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Title for a chat whose title is still the default, given its transcript.
///
/// Returns `None` for an empty transcript so the default title stays in place.
pub fn derive_title(messages: &[Message], updated_at: DateTime<Utc>) -> Option<String> {
    if messages.is_empty() {
        return None;
    }

    match messages.iter().find(|message| message.is_user()) {
        Some(first_user) => Some(truncate_title(first_user.text.trim())),
        None => Some(date_title(updated_at)),
    }
}

fn truncate_title(text: &str) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(TITLE_MAX_CHARS).collect();
    if graphemes.next().is_some() {
        format!("{head}{TITLE_ELLIPSIS}")
    } else {
        head
    }
}

fn date_title(at: DateTime<Utc>) -> String {
    format!("Chat {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M"))
}
