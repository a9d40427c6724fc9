//! savera-core — Panic detection and supportive chat engine.
//!
//! Locates faces with an SCRFD detector, scores each face with a panic
//! classifier (both via ONNX Runtime), applies a score-dependent threshold
//! and aggregates the verdicts. Also holds the persona-anchored chat session
//! used to talk a distressed user through the situation.

pub mod assistant;
pub mod chat;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod frame;
pub mod scorer;
pub mod suggestion;
pub mod threshold;
pub mod types;

pub use assistant::{Assistant, AssistantError, OllamaAssistant};
pub use chat::{ChatError, ChatSession, ChatTurn, Role};
pub use config::{ChatConfig, DetectionConfig};
pub use detector::{FaceLocator, LocateParams, ScrfdFaceLocator};
pub use engine::{EvaluationMode, PanicDecisionEngine};
pub use error::DetectionError;
pub use frame::GrayFrame;
pub use scorer::{OnnxPanicScorer, PanicScorer};
pub use threshold::classify;
pub use types::{
    Classification, DetectionResult, DetectionStatus, FaceRegion, FaceVerdict, PanicScore,
};
