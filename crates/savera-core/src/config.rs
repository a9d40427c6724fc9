//! Tunables for detection and chat, with the documented defaults.

use crate::error::DetectionError;
use std::time::Duration;

pub const DEFAULT_BASE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MODEL_INPUT_SIZE: (u32, u32) = (48, 48);
pub const DEFAULT_SCALE_FACTOR: f32 = 1.1;
pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_PERSONA: &str = "You are a calming and supportive virtual assistant. \
You are talking to a panicked woman. Respond gently, help her calm down, \
ask supportive questions, and guide her toward safety if needed.";

/// Parameters of the detection pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    pub base_threshold: f32,
    /// Width × height the scorer resizes each face to.
    pub model_input_size: (u32, u32),
    pub scale_factor: f32,
    pub min_neighbors: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            base_threshold: DEFAULT_BASE_THRESHOLD,
            model_input_size: DEFAULT_MODEL_INPUT_SIZE,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
        }
    }
}

impl DetectionConfig {
    /// Reject settings the pipeline could never run with.
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !(self.scale_factor.is_finite() && self.scale_factor > 1.0) {
            return Err(DetectionError::InvalidConfig(format!(
                "scale_factor must be > 1.0, got {}",
                self.scale_factor
            )));
        }
        if !self.base_threshold.is_finite() {
            return Err(DetectionError::InvalidConfig(format!(
                "base_threshold must be finite, got {}",
                self.base_threshold
            )));
        }
        let (w, h) = self.model_input_size;
        if w == 0 || h == 0 {
            return Err(DetectionError::InvalidConfig(format!(
                "model input size must be non-zero, got {w}x{h}"
            )));
        }
        Ok(())
    }
}

/// Parameters of a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Content of the system turn that always opens the conversation.
    pub persona_text: String,
    /// Upper bound on one assistant call; exceeding it counts as an upstream failure.
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            persona_text: DEFAULT_PERSONA.to_string(),
            timeout: DEFAULT_CHAT_TIMEOUT,
        }
    }
}
