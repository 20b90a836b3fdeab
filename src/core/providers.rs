//! Provider adapters.
//!
//! Each supported vendor is one [`Provider`] variant. A variant knows its
//! endpoint, how it authenticates, how to turn a conversation window into a
//! request body, and where the reply text sits in the response. None of
//! this touches the network; [`crate::core::dispatcher`] does that.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{
    AnthropicRequest, AnthropicResponse, ChatMessage, ChatRequest, ChatResponse, GeminiContent,
    GeminiPart, GeminiRequest, GeminiResponse,
};
use crate::core::credentials::RegistryError;
use crate::core::message::{Message, Sender};
use crate::utils::url::{append_query, construct_api_url};

/// Reply text used when a successful response has no completion in it.
pub const NO_RESPONSE_CONTENT: &str = "No response content";

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const ANTHROPIC_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    DeepSeek,
    OpenRouter,
}

/// Everything needed to issue one chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Gemini,
        Provider::DeepSeek,
        Provider::OpenRouter,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::DeepSeek => "deepseek",
            Provider::OpenRouter => "openrouter",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Gemini => "Gemini",
            Provider::DeepSeek => "DeepSeek",
            Provider::OpenRouter => "OpenRouter",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Provider::DeepSeek => "https://api.deepseek.com",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    /// Chat endpoint under `base_url`. Gemini puts the model and the key in
    /// the URL; the others use a fixed path.
    pub fn endpoint(self, base_url: &str, model_id: &str, secret: &str) -> String {
        match self {
            Provider::Anthropic => construct_api_url(base_url, "messages"),
            Provider::Gemini => append_query(
                &construct_api_url(base_url, &format!("models/{model_id}:generateContent")),
                "key",
                secret,
            ),
            Provider::OpenAi | Provider::DeepSeek | Provider::OpenRouter => {
                construct_api_url(base_url, "chat/completions")
            }
        }
    }

    pub fn auth_headers(self, secret: &str) -> Vec<(&'static str, String)> {
        match self {
            Provider::Anthropic => vec![
                ("x-api-key", secret.to_string()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
            Provider::Gemini => Vec::new(),
            Provider::OpenAi | Provider::DeepSeek | Provider::OpenRouter => {
                vec![("Authorization", format!("Bearer {secret}"))]
            }
        }
    }

    fn role(self, sender: Sender) -> &'static str {
        match (self, sender) {
            (_, Sender::User) => "user",
            (Provider::Gemini, Sender::Assistant) => "model",
            (_, Sender::Assistant) => "assistant",
        }
    }

    /// Request body for `window` followed by the new user text.
    pub fn build_body(self, model_id: &str, window: &[Message], new_text: &str) -> Value {
        let turns = window
            .iter()
            .map(|message| (self.role(message.sender), message.text.as_str()))
            .chain(std::iter::once((self.role(Sender::User), new_text)));

        let body = match self {
            Provider::Gemini => serde_json::to_value(GeminiRequest {
                contents: turns
                    .map(|(role, text)| GeminiContent {
                        role: Some(role.to_string()),
                        parts: vec![GeminiPart {
                            text: Some(text.to_string()),
                        }],
                    })
                    .collect(),
            }),
            Provider::Anthropic => serde_json::to_value(AnthropicRequest {
                model: model_id.to_string(),
                max_tokens: ANTHROPIC_MAX_TOKENS,
                messages: chat_messages(turns),
            }),
            Provider::OpenAi | Provider::DeepSeek | Provider::OpenRouter => {
                serde_json::to_value(ChatRequest {
                    model: model_id.to_string(),
                    messages: chat_messages(turns),
                })
            }
        };
        // These types only hold strings and integers.
        body.unwrap_or(Value::Null)
    }

    pub fn build_request(
        self,
        base_url: &str,
        model_id: &str,
        secret: &str,
        window: &[Message],
        new_text: &str,
    ) -> ProviderRequest {
        ProviderRequest {
            url: self.endpoint(base_url, model_id, secret),
            headers: self.auth_headers(secret),
            body: self.build_body(model_id, window, new_text),
        }
    }

    /// First textual completion in `body`, or [`NO_RESPONSE_CONTENT`].
    pub fn parse_response(self, body: &str) -> String {
        self.extract_text(body)
            .unwrap_or_else(|| NO_RESPONSE_CONTENT.to_string())
    }

    fn extract_text(self, body: &str) -> Option<String> {
        match self {
            Provider::OpenAi | Provider::DeepSeek | Provider::OpenRouter => {
                let response: ChatResponse = serde_json::from_str(body).ok()?;
                response.choices.into_iter().next()?.message?.content
            }
            Provider::Anthropic => {
                let response: AnthropicResponse = serde_json::from_str(body).ok()?;
                response
                    .content
                    .into_iter()
                    .filter(|block| block.kind.as_deref().is_none_or(|kind| kind == "text"))
                    .find_map(|block| block.text)
            }
            Provider::Gemini => {
                let response: GeminiResponse = serde_json::from_str(body).ok()?;
                response
                    .candidates
                    .into_iter()
                    .next()?
                    .content?
                    .parts
                    .into_iter()
                    .find_map(|part| part.text)
            }
        }
    }
}

fn chat_messages<'a, 'b>(turns: impl Iterator<Item = (&'a str, &'b str)>) -> Vec<ChatMessage> {
    turns
        .map(|(role, text)| ChatMessage {
            role: role.to_string(),
            content: text.to_string(),
        })
        .collect()
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = RegistryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        Provider::ALL
            .into_iter()
            .find(|provider| provider.id().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| RegistryError::UnknownProvider(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn history() -> Vec<Message> {
        vec![
            Message::new(1, Sender::User, "Hi", None),
            Message::new(2, Sender::Assistant, "Hello!", None),
        ]
    }

    #[test]
    fn openai_family_uses_bearer_auth_and_choices_shape() {
        for provider in [Provider::OpenAi, Provider::DeepSeek, Provider::OpenRouter] {
            let request = provider.build_request(
                provider.default_base_url(),
                "gpt-x",
                "sk-test",
                &history(),
                "How are you?",
            );
            assert!(request.url.ends_with("/chat/completions"));
            assert_eq!(
                request.headers,
                vec![("Authorization", "Bearer sk-test".to_string())]
            );
            assert_eq!(
                request.body,
                json!({
                    "model": "gpt-x",
                    "messages": [
                        {"role": "user", "content": "Hi"},
                        {"role": "assistant", "content": "Hello!"},
                        {"role": "user", "content": "How are you?"}
                    ]
                })
            );
        }
    }

    #[test]
    fn anthropic_sets_key_header_and_token_ceiling() {
        let request = Provider::Anthropic.build_request(
            Provider::Anthropic.default_base_url(),
            "claude-x",
            "secret",
            &history(),
            "Next",
        );
        assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
        assert!(request
            .headers
            .contains(&("x-api-key", "secret".to_string())));
        assert!(request
            .headers
            .contains(&("anthropic-version", ANTHROPIC_VERSION.to_string())));
        assert_eq!(request.body["max_tokens"], json!(ANTHROPIC_MAX_TOKENS));
        assert_eq!(request.body["messages"][1]["role"], json!("assistant"));
        assert_eq!(request.body["messages"][2]["content"], json!("Next"));
    }

    #[test]
    fn gemini_puts_model_and_key_in_url_and_maps_model_role() {
        let request = Provider::Gemini.build_request(
            Provider::Gemini.default_base_url(),
            "gemini-x",
            "g-key",
            &history(),
            "Next",
        );
        assert_eq!(
            request.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-x:generateContent?key=g-key"
        );
        assert!(request.headers.is_empty());
        assert_eq!(
            request.body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello!"}]},
                    {"role": "user", "parts": [{"text": "Next"}]}
                ]
            })
        );
        assert!(request.body.get("max_tokens").is_none());
    }

    #[test]
    fn parses_each_response_shape() {
        let openai = r#"{"choices":[{"message":{"role":"assistant","content":"from openai"}}]}"#;
        assert_eq!(Provider::OpenAi.parse_response(openai), "from openai");

        let anthropic = r#"{"content":[{"type":"text","text":"from anthropic"}]}"#;
        assert_eq!(Provider::Anthropic.parse_response(anthropic), "from anthropic");

        let gemini = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"from gemini"}]}}]}"#;
        assert_eq!(Provider::Gemini.parse_response(gemini), "from gemini");
    }

    #[test]
    fn malformed_success_bodies_soft_fail() {
        for provider in Provider::ALL {
            assert_eq!(provider.parse_response("{}"), NO_RESPONSE_CONTENT);
            assert_eq!(provider.parse_response("not json"), NO_RESPONSE_CONTENT);
        }
        assert_eq!(
            Provider::OpenAi.parse_response(r#"{"choices":[{"message":{"content":null}}]}"#),
            NO_RESPONSE_CONTENT
        );
        assert_eq!(
            Provider::Gemini.parse_response(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#),
            NO_RESPONSE_CONTENT
        );
    }

    #[test]
    fn anthropic_skips_non_text_blocks() {
        let body = r#"{"content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"answer"}]}"#;
        assert_eq!(Provider::Anthropic.parse_response(body), "answer");
    }

    #[test]
    fn provider_tags_parse_case_insensitively() {
        assert_eq!("OpenAI".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!(" gemini ".parse::<Provider>(), Ok(Provider::Gemini));
        assert_eq!(
            "mystery".parse::<Provider>(),
            Err(RegistryError::UnknownProvider("mystery".to_string()))
        );
    }

    #[test]
    fn provider_serializes_as_its_tag() {
        for provider in Provider::ALL {
            let encoded = serde_json::to_string(&provider).expect("serialize");
            assert_eq!(encoded, format!("\"{}\"", provider.id()));
        }
    }
}
