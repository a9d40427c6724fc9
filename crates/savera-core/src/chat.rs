//! Supportive chat session anchored by a fixed persona turn.

use crate::assistant::Assistant;
use crate::config::ChatConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

/// One message in the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    role: Role,
    content: String,
}

impl ChatTurn {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("cannot append a {0} turn; only user and assistant turns may be added")]
    InvalidRole(Role),
    #[error("message is empty")]
    EmptyMessage,
    #[error("assistant unavailable: {0}")]
    UpstreamFailure(String),
}

/// Ordered conversation whose first turn is always the persona.
///
/// Not internally synchronized: callers sharing one session across tasks
/// must serialize `converse` and `reset` (e.g. behind a mutex).
pub struct ChatSession {
    turns: Vec<ChatTurn>,
    timeout: Duration,
    assistant: Arc<dyn Assistant>,
}

impl ChatSession {
    pub fn new(config: ChatConfig, assistant: Arc<dyn Assistant>) -> Self {
        let persona = ChatTurn {
            role: Role::System,
            content: config.persona_text,
        };
        Self {
            turns: vec![persona],
            timeout: config.timeout,
            assistant,
        }
    }

    /// Append a user or assistant turn.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Result<(), ChatError> {
        if role == Role::System {
            return Err(ChatError::InvalidRole(role));
        }
        self.turns.push(ChatTurn {
            role,
            content: content.into(),
        });
        Ok(())
    }

    /// Drop everything but the persona turn.
    pub fn reset(&mut self) {
        self.turns.truncate(1);
        tracing::info!("chat history reset");
    }

    /// The full conversation, persona first.
    pub fn snapshot(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the persona turn is always present.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn persona(&self) -> &ChatTurn {
        &self.turns[0]
    }

    /// Record `message`, ask the assistant for a reply and record that too.
    ///
    /// Empty input is rejected before anything is recorded. If the assistant
    /// fails or times out the user turn is kept and no assistant turn is added.
    pub async fn converse(&mut self, message: &str) -> Result<String, ChatError> {
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        tracing::info!(turns = self.turns.len(), "user message received");
        self.append(Role::User, message)?;

        let reply = match tokio::time::timeout(self.timeout, self.assistant.complete(&self.turns)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "assistant call failed");
                return Err(ChatError::UpstreamFailure(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "assistant call timed out");
                return Err(ChatError::UpstreamFailure(format!(
                    "no reply within {:?}",
                    self.timeout
                )));
            }
        };

        self.append(Role::Assistant, reply.clone())?;
        tracing::debug!(turns = self.turns.len(), "assistant reply recorded");
        Ok(reply)
    }
}
