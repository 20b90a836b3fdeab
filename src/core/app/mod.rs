//! Application context: the single owner of chats, credentials, the selected
//! model, persistence and the dispatcher.
//!
//! Every mutation of a persisted collection goes through [`App`], which
//! writes the owning record back immediately. Storage failures are logged and
//! never abort the operation that triggered them.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::core::chat::Chat;
use crate::core::credentials::{CatalogEntry, CredentialRegistry, RegistryError};
use crate::core::dispatcher::Dispatcher;
use crate::core::message::{Message, MessageIdGenerator};
use crate::core::persistence::Persistence;
use crate::core::providers::Provider;
use crate::core::session::{SessionError, SessionStore};
use crate::core::storage::StoreError;

pub mod conversation;

pub use conversation::SendRejected;

/// Startup settings taken from configuration and command-line flags.
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Trailing messages sent with each request.
    pub window_size: usize,
    /// Model to select when the first chat has none bound.
    pub default_model: Option<String>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            window_size: crate::core::config::data::DEFAULT_WINDOW_SIZE,
            default_model: None,
        }
    }
}

/// One line of the chat list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: u64,
    pub title: String,
    pub message_count: usize,
    pub model_id: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
}

pub struct App {
    sessions: SessionStore,
    registry: CredentialRegistry,
    selected_model: Option<String>,
    persistence: Persistence,
    dispatcher: Dispatcher,
    ids: MessageIdGenerator,
    in_flight: bool,
    window_size: usize,
    load_failures: Vec<StoreError>,
}

impl App {
    /// Load everything from `persistence` and pick the starting chat and model.
    ///
    /// The first stored chat becomes active and its bound model is selected.
    /// Without a bound model, `options.default_model` is used, then the first
    /// catalog entry. A chat is created when none were stored.
    ///
    /// Records that fail to load are left untouched on disk for the rest of
    /// the run; see [`App::load_failures`].
    pub fn bootstrap(
        mut persistence: Persistence,
        dispatcher: Dispatcher,
        options: AppOptions,
    ) -> Self {
        let snapshot = persistence.load();

        let mut ids = MessageIdGenerator::new();
        for message in snapshot.chats.iter().flat_map(|chat| &chat.messages) {
            ids.observe(message.id);
        }

        let registry = CredentialRegistry::from_parts(snapshot.credentials, snapshot.catalog);
        let sessions = SessionStore::from_chats(snapshot.chats);
        let selected_model = sessions
            .active_chat()
            .and_then(|chat| chat.model_id.clone())
            .or(options.default_model)
            .or_else(|| registry.catalog().first().map(|entry| entry.id.clone()));

        let mut app = Self {
            sessions,
            registry,
            selected_model,
            persistence,
            dispatcher,
            ids,
            in_flight: false,
            window_size: options.window_size.max(1),
            load_failures: snapshot.failures,
        };

        if app.sessions.is_empty() {
            app.sessions.create_chat(app.selected_model.clone());
            app.persist_chats();
        }
        debug!(
            chats = app.sessions.len(),
            models = app.registry.catalog().len(),
            selected = ?app.selected_model,
            "application ready"
        );
        app
    }

    /// Records that could not be read at startup.
    pub fn load_failures(&self) -> &[StoreError] {
        &self.load_failures
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    // Models

    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    /// Catalog name of a model, falling back to its id.
    pub fn model_display_name<'a>(&'a self, model_id: &'a str) -> &'a str {
        self.registry.display_name(model_id).unwrap_or(model_id)
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        self.registry.catalog()
    }

    pub fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }

    /// Select a model and bind it to the active chat. Models without a
    /// credential can be selected; they answer with a placeholder.
    pub fn select_model(&mut self, model_id: &str) -> Result<(), RegistryError> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(RegistryError::MissingModelId);
        }
        self.selected_model = Some(model_id.to_string());
        if let Some(active_id) = self.sessions.active_id() {
            if let Err(err) = self
                .sessions
                .bind_model(active_id, self.selected_model.clone())
            {
                error!(error = %err, "failed to bind model to active chat");
            }
            self.persist_chats();
        }
        info!(model_id, "selected model");
        Ok(())
    }

    /// Store a credential. A newly added model becomes the selected model.
    ///
    /// Returns `true` when the model was not configured before.
    pub fn add_credential(
        &mut self,
        provider: Provider,
        model_id: &str,
        secret: &str,
        display_name: &str,
    ) -> Result<bool, RegistryError> {
        let is_new = self
            .registry
            .add_credential(provider, model_id, secret, display_name)?;
        self.persist_registry();
        if is_new || self.selected_model.is_none() {
            self.select_model(model_id)?;
        }
        Ok(is_new)
    }

    /// Remove a model and its credential. Chats bound to it, and the
    /// selection, move to the first remaining catalog entry (or none).
    pub fn remove_model(&mut self, model_id: &str) -> bool {
        if !self.registry.remove_model(model_id) {
            return false;
        }
        let replacement = self.registry.catalog().first().map(|entry| entry.id.clone());
        self.sessions.rebind_model(model_id, replacement.as_deref());
        if self.selected_model.as_deref() == Some(model_id) {
            self.selected_model = replacement;
        }
        self.persist_registry();
        self.persist_chats();
        info!(model_id, selected = ?self.selected_model, "removed model");
        true
    }

    // Chats

    pub fn active_chat_id(&self) -> Option<u64> {
        self.sessions.active_id()
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.sessions.active_chat()
    }

    pub fn active_messages(&self) -> &[Message] {
        self.sessions.active_messages()
    }

    pub fn messages(&self, chat_id: u64) -> Option<&[Message]> {
        self.sessions.messages(chat_id)
    }

    /// Start a conversation bound to the selected model, reusing the active
    /// chat when it is still empty.
    pub fn new_chat(&mut self) -> u64 {
        let id = self.sessions.create_chat(self.selected_model.clone());
        self.persist_chats();
        id
    }

    /// Activate a chat and select the model it last used.
    pub fn switch_chat(&mut self, id: u64) -> Result<(), SessionError> {
        self.sessions.switch_chat(id)?;
        self.select_active_chat_model();
        self.persist_chats();
        Ok(())
    }

    pub fn rename_chat(&mut self, id: u64, title: &str) -> Result<(), SessionError> {
        self.sessions.rename_chat(id, title)?;
        self.persist_chats();
        Ok(())
    }

    /// Delete a chat. When it was active, the first remaining chat takes
    /// over along with the model it last used.
    pub fn delete_chat(&mut self, id: u64) -> Result<(), SessionError> {
        let was_active = self.sessions.active_id() == Some(id);
        self.sessions.delete_chat(id)?;
        if was_active {
            self.select_active_chat_model();
        }
        self.persist_chats();
        Ok(())
    }

    /// All chats, newest first.
    pub fn chat_summaries(&self) -> Vec<ChatSummary> {
        let active = self.sessions.active_id();
        self.sessions
            .ids()
            .filter_map(|id| self.sessions.chat(id))
            .map(|chat| ChatSummary {
                id: chat.id,
                title: chat.title.clone(),
                message_count: self.sessions.messages(chat.id).map_or(0, <[Message]>::len),
                model_id: chat.model_id.clone(),
                updated_at: chat.updated_at,
                active: active == Some(chat.id),
            })
            .collect()
    }

    /// Chats without a bound model keep the current selection.
    fn select_active_chat_model(&mut self) {
        if let Some(model_id) = self.sessions.active_chat().and_then(|chat| chat.model_id.clone()) {
            self.selected_model = Some(model_id);
        }
    }

    // Persistence

    fn persist_chats(&mut self) {
        let chats = self.sessions.chats();
        if let Err(err) = self.persistence.save_chats(chats) {
            error!(error = %err, "failed to save chats");
        }
    }

    fn persist_registry(&mut self) {
        if let Err(err) = self.persistence.save_registry(&self.registry) {
            error!(error = %err, "failed to save credentials");
        }
    }
}

#[cfg(test)]
mod tests;
