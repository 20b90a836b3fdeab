//! Ordered chat collection with a single active chat.
//!
//! The active chat's transcript lives in a separate buffer while it is being
//! worked on. The buffer is written back into the collection before another
//! chat becomes active and before the collection is handed out for
//! serialization, so readers of [`SessionStore::chats`] always see complete
//! transcripts.

use std::error::Error;
use std::fmt;

use chrono::Utc;
use tracing::debug;

use crate::core::chat::{derive_title, Chat, ChatState, DEFAULT_CHAT_TITLE};
use crate::core::message::{now_millis, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    UnknownChat(u64),
    EmptyTitle,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnknownChat(id) => write!(f, "No chat with id {id}"),
            SessionError::EmptyTitle => write!(f, "Chat title cannot be empty"),
        }
    }
}

impl Error for SessionError {}

#[derive(Debug, Default)]
pub struct SessionStore {
    chats: Vec<Chat>,
    active: Option<u64>,
    buffer: Vec<Message>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted chats. The first chat becomes active.
    pub fn from_chats(chats: Vec<Chat>) -> Self {
        let mut store = Self {
            chats,
            active: None,
            buffer: Vec::new(),
        };
        if let Some(first) = store.chats.first().map(|chat| chat.id) {
            store.activate(first);
        }
        store
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    /// Chat ids in display order.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.chats.iter().map(|chat| chat.id)
    }

    pub fn active_id(&self) -> Option<u64> {
        self.active
    }

    /// Transcript of the active chat, oldest first.
    pub fn active_messages(&self) -> &[Message] {
        &self.buffer
    }

    /// Metadata of the active chat. Its `messages` field may lag behind
    /// [`SessionStore::active_messages`] until the next flush.
    pub fn active_chat(&self) -> Option<&Chat> {
        self.active.and_then(|id| self.find(id))
    }

    pub fn chat(&self, id: u64) -> Option<&Chat> {
        self.find(id)
    }

    /// Lifecycle state of a chat, judged by its live transcript.
    pub fn state(&self, id: u64) -> Option<ChatState> {
        let chat = self.find(id)?;
        let messages = self.messages(id)?;
        Some(chat.state_for(messages))
    }

    /// All chats, most recently created first, with the active buffer flushed.
    pub fn chats(&mut self) -> &[Chat] {
        self.flush();
        &self.chats
    }

    /// Messages of any chat, reading the live buffer for the active one.
    pub fn messages(&self, id: u64) -> Option<&[Message]> {
        if self.active == Some(id) {
            return Some(&self.buffer);
        }
        self.find(id).map(|chat| chat.messages.as_slice())
    }

    /// Trailing `size` messages of a chat, oldest first.
    pub fn window(&self, id: u64, size: usize) -> Vec<Message> {
        let messages = self.messages(id).unwrap_or_default();
        let start = messages.len().saturating_sub(size);
        messages[start..].to_vec()
    }

    /// Start a new conversation, or reuse the active one when it has no
    /// messages yet. Returns the id of the chat that is now active.
    pub fn create_chat(&mut self, model_id: Option<String>) -> u64 {
        if let Some(active_id) = self.active {
            if self.buffer.is_empty() {
                if let Some(chat) = self.find_mut(active_id) {
                    if chat.messages.is_empty() {
                        chat.model_id = model_id;
                        chat.touch();
                        debug!(chat_id = active_id, "reusing empty active chat");
                        return active_id;
                    }
                }
            }
        }

        self.flush();
        let id = self.fresh_chat_id();
        self.chats.insert(0, Chat::new(id, model_id));
        self.active = Some(id);
        self.buffer.clear();
        debug!(chat_id = id, "created chat");
        id
    }

    pub fn switch_chat(&mut self, id: u64) -> Result<(), SessionError> {
        if self.find(id).is_none() {
            return Err(SessionError::UnknownChat(id));
        }
        if self.active == Some(id) {
            return Ok(());
        }
        self.flush();
        self.activate(id);
        Ok(())
    }

    pub fn append_message(&mut self, chat_id: u64, message: Message) -> Result<(), SessionError> {
        let is_active = self.active == Some(chat_id);
        let chat = self
            .chats
            .iter_mut()
            .find(|chat| chat.id == chat_id)
            .ok_or(SessionError::UnknownChat(chat_id))?;

        chat.updated_at = Utc::now();
        let needs_title = chat.title == DEFAULT_CHAT_TITLE;

        let transcript = if is_active {
            &mut self.buffer
        } else {
            &mut chat.messages
        };
        transcript.push(message);

        if needs_title {
            if let Some(title) = derive_title(transcript, chat.updated_at) {
                chat.title = title;
            }
        }
        Ok(())
    }

    pub fn rename_chat(&mut self, id: u64, title: &str) -> Result<(), SessionError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SessionError::EmptyTitle);
        }
        let chat = self.find_mut(id).ok_or(SessionError::UnknownChat(id))?;
        chat.title = title.to_string();
        chat.touch();
        Ok(())
    }

    pub fn delete_chat(&mut self, id: u64) -> Result<(), SessionError> {
        let index = self
            .chats
            .iter()
            .position(|chat| chat.id == id)
            .ok_or(SessionError::UnknownChat(id))?;
        self.chats.remove(index);

        if self.active == Some(id) {
            self.active = None;
            self.buffer.clear();
            if let Some(next) = self.chats.first().map(|chat| chat.id) {
                self.activate(next);
            }
        }
        debug!(chat_id = id, remaining = self.chats.len(), "deleted chat");
        Ok(())
    }

    /// Record the model a chat last talked to.
    pub fn bind_model(&mut self, id: u64, model_id: Option<String>) -> Result<(), SessionError> {
        let chat = self.find_mut(id).ok_or(SessionError::UnknownChat(id))?;
        chat.model_id = model_id;
        Ok(())
    }

    /// Replace every chat bound to `model_id` with `replacement`.
    pub fn rebind_model(&mut self, model_id: &str, replacement: Option<&str>) {
        for chat in &mut self.chats {
            if chat.model_id.as_deref() == Some(model_id) {
                chat.model_id = replacement.map(str::to_string);
            }
        }
    }

    /// Write the active buffer back into its chat.
    pub fn flush(&mut self) {
        let Some(active_id) = self.active else {
            return;
        };
        let buffer = self.buffer.clone();
        if let Some(chat) = self.find_mut(active_id) {
            chat.messages = buffer;
        }
    }

    fn activate(&mut self, id: u64) {
        self.buffer = self
            .find(id)
            .map(|chat| chat.messages.clone())
            .unwrap_or_default();
        self.active = Some(id);
    }

    fn fresh_chat_id(&self) -> u64 {
        let highest = self.chats.iter().map(|chat| chat.id).max().unwrap_or(0);
        now_millis().max(highest + 1)
    }

    fn find(&self, id: u64) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id == id)
    }

    fn find_mut(&mut self, id: u64) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|chat| chat.id == id)
    }
}
