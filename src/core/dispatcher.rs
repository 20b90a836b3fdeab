//! Performs one request/response exchange per user message.
//!
//! [`Dispatcher::send`] never fails from the caller's point of view: every
//! problem (missing key, transport error, upstream rejection, odd response)
//! comes back as an [`Outcome`] whose text is shown in the chat like any
//! other reply.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::credentials::Credential;
use crate::core::message::Message;
use crate::core::providers::{Provider, ProviderRequest};

/// Everything a dispatch needs, captured when the user message is committed.
#[derive(Debug, Clone)]
pub struct PendingDispatch {
    pub chat_id: u64,
    pub model_id: String,
    pub display_name: String,
    pub credential: Option<Credential>,
    /// Trailing history, oldest first, not including `text`.
    pub window: Vec<Message>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text extracted from a successful response.
    Reply(String),
    /// Canned answer for a model that has no credential. No request was made.
    Placeholder(String),
    /// Transport failure or non-success status, rendered for the transcript.
    Error(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Outcome::Reply(text) | Outcome::Placeholder(text) | Outcome::Error(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Outcome::Reply(text) | Outcome::Placeholder(text) | Outcome::Error(text) => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    base_urls: HashMap<Provider, String>,
}

impl Dispatcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_urls: HashMap::new(),
        }
    }

    /// Build a client honoring an optional overall request timeout.
    pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    pub fn with_base_url(mut self, provider: Provider, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, base_url.into());
        self
    }

    pub fn base_url(&self, provider: Provider) -> &str {
        self.base_urls
            .get(&provider)
            .map(String::as_str)
            .unwrap_or_else(|| provider.default_base_url())
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn send(&self, pending: &PendingDispatch) -> Outcome {
        let Some(credential) = pending.credential.as_ref() else {
            debug!(model_id = %pending.model_id, "no credential configured; answering locally");
            return Outcome::Placeholder(placeholder_reply(&pending.display_name, &pending.text));
        };

        let provider = credential.provider;
        let request = provider.build_request(
            self.base_url(provider),
            &credential.model_id,
            &credential.secret,
            &pending.window,
            &pending.text,
        );
        debug!(
            provider = provider.id(),
            model_id = %credential.model_id,
            window = pending.window.len(),
            "dispatching chat request"
        );

        let outcome = match self.execute(request).await {
            Ok((status, body)) if status.is_success() => {
                Outcome::Reply(provider.parse_response(&body))
            }
            Ok((status, body)) => Outcome::Error(format!(
                "{} API error ({}): {}",
                provider.display_name(),
                status.as_u16(),
                body
            )),
            Err(err) => Outcome::Error(format!("Error: {err}")),
        };

        if let Outcome::Error(text) = &outcome {
            warn!(provider = provider.id(), model_id = %credential.model_id, "{text}");
        }
        outcome
    }

    async fn execute(
        &self,
        request: ProviderRequest,
    ) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
        let mut http_request = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/json");
        for (name, value) in &request.headers {
            http_request = http_request.header(*name, value);
        }

        let response = http_request.json(&request.body).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// Reply used in demo mode, when the selected model has no API key.
pub fn placeholder_reply(display_name: &str, text: &str) -> String {
    format!(
        "({display_name}): No API key is configured for this model, so no request was sent. \
You said \"{text}\". Add an API key for this model to get real replies."
    )
}
