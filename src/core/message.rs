use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sender {
    User,
    Assistant,
}

/// One entry of a chat transcript. Messages are never edited after creation;
/// chats only ever append new ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Sender::User
    }
}

impl TryFrom<&str> for Sender {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Sender::User),
            // Older transcripts call the assistant side "ai".
            "assistant" | "ai" => Ok(Sender::Assistant),
            _ => Err(format!("invalid message sender: {value}")),
        }
    }
}

impl TryFrom<String> for Sender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Sender> for String {
    fn from(value: Sender) -> Self {
        value.as_str().to_string()
    }
}

impl Message {
    pub fn new(id: u64, sender: Sender, text: impl Into<String>, model_id: Option<String>) -> Self {
        Self {
            id,
            sender,
            text: text.into(),
            model_id,
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.sender == Sender::Assistant
    }
}

/// Hands out strictly increasing message ids.
///
/// Ids follow wall-clock milliseconds when the clock is ahead of the last id
/// issued, and otherwise step by one, so ids stay unique even when several
/// messages are created within the same millisecond or the clock goes back.
#[derive(Debug, Clone, Default)]
pub struct MessageIdGenerator {
    last: u64,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure future ids are greater than `id`. Used after loading history.
    pub fn observe(&mut self, id: u64) {
        self.last = self.last.max(id);
    }

    pub fn next_id(&mut self) -> u64 {
        let next = now_millis().max(self.last + 1);
        self.last = next;
        next
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_strictly_increase() {
        let mut ids = MessageIdGenerator::new();
        let first = ids.next_id();
        let second = ids.next_id();
        let third = ids.next_id();
        assert!(first < second && second < third);
    }

    #[test]
    fn observed_ids_are_never_reissued() {
        let mut ids = MessageIdGenerator::new();
        let far_future = now_millis() + 1_000_000;
        ids.observe(far_future);
        assert_eq!(ids.next_id(), far_future + 1);
    }

    #[test]
    fn legacy_ai_sender_is_accepted() {
        let message: Message =
            serde_json::from_str(r#"{"id":1,"sender":"ai","text":"hi"}"#).expect("parse");
        assert_eq!(message.sender, Sender::Assistant);
        assert_eq!(message.model_id, None);
    }

    #[test]
    fn invalid_senders_are_rejected() {
        assert!(Sender::try_from("system").is_err());
    }
}
