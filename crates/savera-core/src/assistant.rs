//! Conversational assistant backends.
//!
//! [`Assistant`] is the seam the chat session talks through; [`OllamaAssistant`]
//! calls a local Ollama server's non-streaming `/api/chat` endpoint.

use crate::chat::{ChatTurn, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_CHAT_MODEL: &str = "phi3";

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("assistant returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed assistant response: {0}")]
    Malformed(String),
}

/// Produces the next assistant message for a conversation.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, AssistantError>;
}

/// Assistant backed by an Ollama chat model.
#[derive(Clone)]
pub struct OllamaAssistant {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaAssistant {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

impl Default for OllamaAssistant {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL, DEFAULT_CHAT_MODEL)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

fn build_request<'a>(model: &'a str, turns: &'a [ChatTurn]) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: turns
            .iter()
            .map(|t| WireMessage {
                role: t.role(),
                content: t.content(),
            })
            .collect(),
        stream: false,
    }
}

fn extract_reply(body: &str) -> Result<String, AssistantError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| AssistantError::Malformed(e.to_string()))?;
    if let Some(error) = parsed.error {
        return Err(AssistantError::Malformed(error));
    }
    parsed
        .message
        .map(|m| m.content)
        .ok_or_else(|| AssistantError::Malformed("response has no message".into()))
}

#[async_trait]
impl Assistant for OllamaAssistant {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, AssistantError> {
        let request = build_request(&self.model, turns);
        tracing::debug!(model = %self.model, turns = turns.len(), "sending chat request");

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistantError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(AssistantError::Status {
                status: status.as_u16(),
                body,
            });
        }

        extract_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatSession;
    use crate::config::ChatConfig;
    use std::sync::Arc;

    #[test]
    fn test_request_body_shape() {
        let mut session = ChatSession::new(
            ChatConfig { persona_text: "calm".into(), ..ChatConfig::default() },
            Arc::new(OllamaAssistant::default()),
        );
        session.append(Role::User, "help me").unwrap();

        let body = serde_json::to_value(build_request("phi3", session.snapshot())).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "phi3",
                "messages": [
                    { "role": "system", "content": "calm" },
                    { "role": "user", "content": "help me" },
                ],
                "stream": false,
            })
        );
    }

    #[test]
    fn test_extract_reply() {
        let body = r#"{"model":"phi3","message":{"role":"assistant","content":"Breathe in."},"done":true}"#;
        assert_eq!(extract_reply(body).unwrap(), "Breathe in.");
    }

    #[test]
    fn test_extract_reply_error_field() {
        let body = r#"{"error":"model 'phi3' not found"}"#;
        let err = extract_reply(body).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_extract_reply_garbage() {
        assert!(matches!(extract_reply("<html>"), Err(AssistantError::Malformed(_))));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let a = OllamaAssistant::new("http://host:11434/", "phi3");
        assert_eq!(a.endpoint(), "http://host:11434/api/chat");
    }
}
