//! Panic decision pipeline: locate → crop → score → classify → aggregate.

use crate::config::DetectionConfig;
use crate::detector::{FaceLocator, LocateParams, ScrfdFaceLocator};
use crate::error::DetectionError;
use crate::frame::GrayFrame;
use crate::scorer::{OnnxPanicScorer, PanicScorer};
use crate::suggestion::safety_suggestion;
use crate::threshold::classify;
use crate::types::{DetectionResult, FaceRegion, FaceVerdict};

/// How the input image should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationMode {
    /// Locate faces first and score each one.
    #[default]
    WholeImage,
    /// The input is already a face crop; score it as-is.
    SingleFace,
}

/// Runs the detection pipeline over one image at a time.
///
/// Owns its locator and scorer; both are loaded once and reused for every call.
pub struct PanicDecisionEngine<L = ScrfdFaceLocator, S = OnnxPanicScorer> {
    locator: L,
    scorer: S,
    config: DetectionConfig,
}

impl<L: FaceLocator, S: PanicScorer> PanicDecisionEngine<L, S> {
    pub fn new(locator: L, scorer: S, config: DetectionConfig) -> Self {
        Self {
            locator,
            scorer,
            config,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Decode an encoded image and evaluate it.
    pub fn evaluate_bytes(
        &mut self,
        bytes: &[u8],
        mode: EvaluationMode,
    ) -> Result<DetectionResult, DetectionError> {
        let frame = GrayFrame::decode(bytes)?;
        self.evaluate(&frame, mode)
    }

    /// Evaluate a grayscale frame.
    ///
    /// Every face is scored. If any face fails to crop or score the whole
    /// evaluation fails, since dropping it could hide a true positive.
    pub fn evaluate(
        &mut self,
        frame: &GrayFrame,
        mode: EvaluationMode,
    ) -> Result<DetectionResult, DetectionError> {
        if frame.width == 0 || frame.height == 0 || frame.data.is_empty() {
            return Err(DetectionError::InvalidImage("zero-area image".into()));
        }

        let verdicts = match mode {
            EvaluationMode::SingleFace => vec![self.judge(0, frame, None)?],
            EvaluationMode::WholeImage => {
                let params = LocateParams {
                    scale_factor: self.config.scale_factor,
                    min_neighbors: self.config.min_neighbors,
                };
                let regions = self.locator.locate(frame, &params)?;
                if regions.is_empty() {
                    tracing::info!(width = frame.width, height = frame.height, "no face detected");
                    return Ok(DetectionResult::no_face());
                }
                tracing::info!(count = regions.len(), "faces detected");

                let mut verdicts = Vec::with_capacity(regions.len());
                for (index, region) in regions.into_iter().enumerate() {
                    let crop = frame.crop(&region)?;
                    verdicts.push(self.judge(index, &crop, Some(region))?);
                }
                verdicts
            }
        };

        let result = DetectionResult::from_verdicts(verdicts, safety_suggestion);
        if result.panic_detected() {
            tracing::warn!(faces = result.faces().len(), "panic detected");
        }
        Ok(result)
    }

    fn judge(
        &mut self,
        index: usize,
        face: &GrayFrame,
        region: Option<FaceRegion>,
    ) -> Result<FaceVerdict, DetectionError> {
        let score = self.scorer.score(face).map_err(|e| {
            tracing::error!(face = index + 1, error = %e, "face scoring failed");
            e
        })?;
        let classification = classify(score, self.config.base_threshold);

        tracing::info!(
            face = index + 1,
            score = classification.score,
            threshold = classification.threshold_used,
            panic = classification.is_panic,
            "face classified"
        );

        Ok(FaceVerdict {
            index,
            region,
            classification,
        })
    }
}
