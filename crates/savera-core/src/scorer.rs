//! Panic scoring of a single face crop.
//!
//! The shipped scorer is a small CNN exported to ONNX. It takes a single-channel
//! NHWC tensor of the face resized to the model input resolution, with pixels
//! scaled to [0, 1], and emits one sigmoid probability.

use crate::error::DetectionError;
use crate::frame::GrayFrame;
use crate::types::PanicScore;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const PIXEL_SCALE: f32 = 255.0;

/// Produces a panic score for one face crop.
///
/// Implementations resize the crop to their input resolution and normalize it
/// to [0, 1] before scoring, so any model honoring that contract is drop-in.
pub trait PanicScorer: Send {
    fn score(&mut self, face: &GrayFrame) -> Result<PanicScore, DetectionError>;
}

/// ONNX-backed panic classifier.
pub struct OnnxPanicScorer {
    session: Session,
    input_size: (u32, u32),
}

impl OnnxPanicScorer {
    /// Load the classifier from `model_path`; `input_size` is (width, height).
    pub fn load(model_path: &str, input_size: (u32, u32)) -> Result<Self, DetectionError> {
        if !Path::new(model_path).exists() {
            return Err(DetectionError::ModelNotFound(model_path.to_string()));
        }
        if input_size.0 == 0 || input_size.1 == 0 {
            return Err(DetectionError::ModelFailure(format!(
                "model input size must be non-zero, got {}x{}",
                input_size.0, input_size.1
            )));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            width = input_size.0,
            height = input_size.1,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded panic classifier"
        );

        Ok(Self { session, input_size })
    }

    /// Resize a face crop and pack it into a `[1, H, W, 1]` tensor in [0, 1].
    fn preprocess(face: &GrayFrame, input_size: (u32, u32)) -> Result<Array4<f32>, DetectionError> {
        let (w, h) = input_size;
        let resized = face.resize(w, h)?;
        let (w, h) = (w as usize, h as usize);

        let mut tensor = Array4::<f32>::zeros((1, h, w, 1));
        for y in 0..h {
            for x in 0..w {
                tensor[[0, y, x, 0]] = resized.data[y * w + x] as f32 / PIXEL_SCALE;
            }
        }
        Ok(tensor)
    }
}

impl PanicScorer for OnnxPanicScorer {
    fn score(&mut self, face: &GrayFrame) -> Result<PanicScore, DetectionError> {
        if face.width == 0 || face.height == 0 || face.data.is_empty() {
            return Err(DetectionError::InvalidRegion("empty face crop".into()));
        }

        let input = Self::preprocess(face, self.input_size)?;
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::ModelFailure(format!("score extraction: {e}")))?;

        let value = raw
            .first()
            .copied()
            .ok_or_else(|| DetectionError::ModelFailure("classifier returned an empty tensor".into()))?;

        score_from_output(value)
    }
}

/// Clamp a raw classifier output into a [`PanicScore`].
fn score_from_output(value: f32) -> Result<PanicScore, DetectionError> {
    if !value.is_finite() {
        return Err(DetectionError::ModelFailure(format!(
            "classifier returned non-finite score {value}"
        )));
    }
    PanicScore::new(value.clamp(0.0, 1.0))
        .ok_or_else(|| DetectionError::ModelFailure(format!("score {value} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_output_shape() {
        let face = GrayFrame::from_raw(vec![128u8; 120 * 90], 120, 90).unwrap();
        let tensor = OnnxPanicScorer::preprocess(&face, (48, 48)).unwrap();
        assert_eq!(tensor.shape(), &[1, 48, 48, 1]);
    }

    #[test]
    fn test_preprocess_non_square_input_size() {
        let face = GrayFrame::from_raw(vec![0u8; 10 * 10], 10, 10).unwrap();
        let tensor = OnnxPanicScorer::preprocess(&face, (64, 32)).unwrap();
        assert_eq!(tensor.shape(), &[1, 32, 64, 1]);
    }

    #[test]
    fn test_preprocess_normalizes_to_unit_range() {
        let face = GrayFrame::from_raw(vec![255u8; 48 * 48], 48, 48).unwrap();
        let tensor = OnnxPanicScorer::preprocess(&face, (48, 48)).unwrap();
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));

        let face = GrayFrame::from_raw(vec![51u8; 48 * 48], 48, 48).unwrap();
        let tensor = OnnxPanicScorer::preprocess(&face, (48, 48)).unwrap();
        assert!((tensor[[0, 10, 10, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_score_from_output_clamps() {
        assert_eq!(score_from_output(1.0000001).unwrap().value(), 1.0);
        assert_eq!(score_from_output(-0.0001).unwrap().value(), 0.0);
        assert!((score_from_output(0.42).unwrap().value() - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_score_from_output_rejects_nan() {
        assert!(matches!(
            score_from_output(f32::NAN),
            Err(DetectionError::ModelFailure(_))
        ));
    }
}
