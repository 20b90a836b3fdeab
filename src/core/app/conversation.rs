use std::error::Error;
use std::fmt;

use tracing::{debug, warn};

use super::App;
use crate::core::dispatcher::{Outcome, PendingDispatch};
use crate::core::message::{Message, Sender};
use crate::core::session::SessionError;

/// Why a send did not start. Nothing was changed in any of these cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendRejected {
    /// A previous send is still waiting for its reply.
    Busy,
    EmptyMessage,
    NoModelSelected,
    Session(SessionError),
}

impl fmt::Display for SendRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendRejected::Busy => write!(f, "Still waiting for the previous reply"),
            SendRejected::EmptyMessage => write!(f, "Message is empty"),
            SendRejected::NoModelSelected => {
                write!(f, "No model selected; add one with add-model or /add")
            }
            SendRejected::Session(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SendRejected {}

impl App {
    /// Commit a user message to the active chat and describe the request
    /// that answers it. Marks the application busy until
    /// [`App::complete_send`] runs.
    pub fn begin_send(&mut self, text: &str) -> Result<PendingDispatch, SendRejected> {
        if self.in_flight {
            debug!("send ignored while a reply is pending");
            return Err(SendRejected::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SendRejected::EmptyMessage);
        }
        let model_id = self
            .selected_model
            .clone()
            .ok_or(SendRejected::NoModelSelected)?;

        let chat_id = match self.sessions.active_id() {
            Some(id) => id,
            None => self.sessions.create_chat(Some(model_id.clone())),
        };
        // History before this message; the new text is sent separately.
        let window = self.sessions.window(chat_id, self.window_size);

        let message = Message::new(
            self.ids.next_id(),
            Sender::User,
            text,
            Some(model_id.clone()),
        );
        self.sessions
            .append_message(chat_id, message)
            .map_err(SendRejected::Session)?;
        if let Err(err) = self.sessions.bind_model(chat_id, Some(model_id.clone())) {
            warn!(error = %err, chat_id, "could not bind model to chat");
        }
        self.persist_chats();
        self.in_flight = true;

        Ok(PendingDispatch {
            chat_id,
            display_name: self.model_display_name(&model_id).to_string(),
            credential: self.registry.credential(&model_id).cloned(),
            model_id,
            window,
            text: text.to_string(),
        })
    }

    /// Record the reply to `pending` in the chat that sent it, even if
    /// another chat has become active since, and clear the busy flag.
    pub fn complete_send(&mut self, pending: &PendingDispatch, outcome: Outcome) {
        self.in_flight = false;
        let message = Message::new(
            self.ids.next_id(),
            Sender::Assistant,
            outcome.into_text(),
            Some(pending.model_id.clone()),
        );
        match self.sessions.append_message(pending.chat_id, message) {
            Ok(()) => self.persist_chats(),
            Err(err) => warn!(error = %err, chat_id = pending.chat_id, "dropping reply"),
        }
    }

    /// Send `text` with the selected model and wait for the reply.
    ///
    /// Returns the reply that was appended to the chat. Upstream and
    /// transport failures are replies too; only [`SendRejected`] is an error.
    pub async fn send(&mut self, text: &str) -> Result<Outcome, SendRejected> {
        let pending = self.begin_send(text)?;
        let outcome = self.dispatcher.send(&pending).await;
        self.complete_send(&pending, outcome.clone());
        Ok(outcome)
    }
}
