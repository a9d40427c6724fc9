use crate::engine::{EngineError, EngineHandle};
use savera_core::{
    ChatError, ChatSession, ChatTurn, DetectionError, DetectionResult, EvaluationMode,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use zbus::interface;

/// D-Bus interface for the Savera daemon.
///
/// Bus name: org.savera.Savera1
/// Object path: /org/savera/Savera1
pub struct SaveraService {
    engine: EngineHandle,
    /// One conversation per daemon; the mutex serializes `SendMessage` and `ResetChat`.
    chat: Arc<Mutex<ChatSession>>,
    chat_model: String,
}

impl SaveraService {
    pub fn new(engine: EngineHandle, chat: ChatSession, chat_model: String) -> Self {
        Self {
            engine,
            chat: Arc::new(Mutex::new(chat)),
            chat_model,
        }
    }

    /// One user turn against the shared session; holds the lock for the whole call.
    async fn chat_turn(&self, message: &str) -> Result<String, ChatError> {
        let mut chat = self.chat.lock().await;
        chat.converse(message).await
    }

    async fn clear_chat(&self) {
        self.chat.lock().await.reset();
    }

    async fn history(&self) -> Vec<ChatTurn> {
        self.chat.lock().await.snapshot().to_vec()
    }

    /// Never waits on the chat lock; while a message is in flight the turn
    /// count is reported as `null` with `chat_busy: true`.
    fn status_report(&self) -> serde_json::Value {
        let turns = self.chat.try_lock().ok().map(|chat| chat.len());
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "models_loaded": true,
            "chat_model": self.chat_model,
            "chat_busy": turns.is_none(),
            "chat_turns": turns,
        })
    }
}

#[interface(name = "org.savera.Savera1")]
impl SaveraService {
    /// Run panic detection on an encoded image. `cropped` skips face localization.
    ///
    /// Returns the detection result as JSON.
    async fn detect_panic(&self, image: Vec<u8>, cropped: bool) -> zbus::fdo::Result<String> {
        let mode = if cropped {
            EvaluationMode::SingleFace
        } else {
            EvaluationMode::WholeImage
        };
        tracing::info!(bytes = image.len(), ?mode, "detect_panic requested");

        let result = self.engine.evaluate(image, mode).await.map_err(engine_error)?;
        tracing::info!(status = %result.status(), "detect_panic finished");
        render_detection(&result)
    }

    /// Send a user message to the supportive assistant and return its reply.
    async fn send_message(&self, message: &str) -> zbus::fdo::Result<String> {
        self.chat_turn(message).await.map_err(chat_error)
    }

    /// Clear the conversation back to the persona turn.
    async fn reset_chat(&self) -> zbus::fdo::Result<()> {
        self.clear_chat().await;
        Ok(())
    }

    /// Current conversation as a JSON array of `{role, content}` turns.
    async fn chat_history(&self) -> zbus::fdo::Result<String> {
        serde_json::to_string(&self.history().await)
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return daemon status information without waiting on an in-flight message.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(self.status_report().to_string())
    }
}

fn render_detection(result: &DetectionResult) -> zbus::fdo::Result<String> {
    serde_json::to_string(result).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

fn engine_error(err: EngineError) -> zbus::fdo::Error {
    tracing::warn!(error = %err, "detection failed");
    match err {
        EngineError::Detection(
            DetectionError::InvalidImage(_) | DetectionError::InvalidRegion(_),
        ) => zbus::fdo::Error::InvalidArgs(err.to_string()),
        _ => zbus::fdo::Error::Failed(err.to_string()),
    }
}

fn chat_error(err: ChatError) -> zbus::fdo::Error {
    match err {
        ChatError::EmptyMessage | ChatError::InvalidRole(_) => {
            zbus::fdo::Error::InvalidArgs(err.to_string())
        }
        ChatError::UpstreamFailure(_) => zbus::fdo::Error::Failed(err.to_string()),
    }
}
