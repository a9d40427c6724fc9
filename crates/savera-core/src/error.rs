use thiserror::Error;

/// Failures of the detection pipeline.
///
/// A detection failure is always distinct from a negative detection: none of
/// these are ever folded into `panic_detected = false`.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("invalid face region: {0}")]
    InvalidRegion(String),
    #[error("model file not found: {0} — export the model to ONNX and place it in the model directory")]
    ModelNotFound(String),
    #[error("invalid detection settings: {0}")]
    InvalidConfig(String),
    #[error("model failure: {0}")]
    ModelFailure(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}
