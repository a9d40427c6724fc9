use savera_core::{
    DetectionConfig, DetectionError, DetectionResult, EvaluationMode, FaceLocator,
    OnnxPanicScorer, PanicDecisionEngine, PanicScorer, ScrfdFaceLocator,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Evaluate {
        image: Vec<u8>,
        mode: EvaluationMode,
        reply: oneshot::Sender<Result<DetectionResult, DetectionError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Decode `image` and run the panic pipeline over it.
    pub async fn evaluate(
        &self,
        image: Vec<u8>,
        mode: EvaluationMode,
    ) -> Result<DetectionResult, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Evaluate {
                image,
                mode,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }
}

/// Load both ONNX models and spawn the engine on a dedicated OS thread.
///
/// Fails fast at startup if the settings are invalid or either model is unavailable.
pub fn spawn_engine(
    scrfd_path: &str,
    panic_model_path: &str,
    config: DetectionConfig,
) -> Result<EngineHandle, EngineError> {
    config.validate()?;

    let locator = ScrfdFaceLocator::load(scrfd_path)?;
    tracing::info!(path = scrfd_path, "SCRFD locator loaded");

    let scorer = OnnxPanicScorer::load(panic_model_path, config.model_input_size)?;
    tracing::info!(path = panic_model_path, "panic classifier loaded");

    spawn_with(PanicDecisionEngine::new(locator, scorer, config))
}

/// Run an already-built engine on its own thread.
///
/// Requests are processed one at a time; the models are only ever touched
/// from this thread.
pub fn spawn_with<L, S>(mut engine: PanicDecisionEngine<L, S>) -> Result<EngineHandle, EngineError>
where
    L: FaceLocator + 'static,
    S: PanicScorer + 'static,
{
    let config = engine.config();
    tracing::info!(
        base_threshold = config.base_threshold,
        scale_factor = config.scale_factor,
        min_neighbors = config.min_neighbors,
        input_width = config.model_input_size.0,
        input_height = config.model_input_size.1,
        "starting engine thread"
    );

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("savera-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Evaluate { image, mode, reply } => {
                        tracing::debug!(bytes = image.len(), ?mode, "evaluate requested");
                        let result = engine.evaluate_bytes(&image, mode);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use savera_core::{DetectionStatus, FaceRegion, GrayFrame, LocateParams, PanicScore};

    struct CenterLocator;

    impl FaceLocator for CenterLocator {
        fn locate(
            &mut self,
            frame: &GrayFrame,
            _params: &LocateParams,
        ) -> Result<Vec<FaceRegion>, DetectionError> {
            Ok(vec![FaceRegion::new(0, 0, frame.width / 2, frame.height / 2)])
        }
    }

    struct BrightnessScorer;

    impl PanicScorer for BrightnessScorer {
        fn score(&mut self, face: &GrayFrame) -> Result<PanicScore, DetectionError> {
            let mean = face.data.iter().map(|&p| p as f32).sum::<f32>() / face.data.len() as f32;
            Ok(PanicScore::new(mean / 255.0).unwrap())
        }
    }

    fn png(value: u8) -> Vec<u8> {
        let img = image::GrayImage::from_pixel(8, 8, image::Luma([value]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn handle() -> EngineHandle {
        spawn_with(PanicDecisionEngine::new(
            CenterLocator,
            BrightnessScorer,
            DetectionConfig::default(),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_evaluate_round_trips_through_thread() {
        let engine = handle();

        let result = engine.evaluate(png(250), EvaluationMode::WholeImage).await.unwrap();
        assert_eq!(result.status(), DetectionStatus::Panic);

        let result = engine.evaluate(png(10), EvaluationMode::SingleFace).await.unwrap();
        assert_eq!(result.status(), DetectionStatus::NoPanic);
    }

    #[test]
    fn test_bad_scale_factor_fails_at_startup() {
        let config = DetectionConfig { scale_factor: 1.0, ..DetectionConfig::default() };
        let err = spawn_engine("/nonexistent/det.onnx", "/nonexistent/panic.onnx", config)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Detection(DetectionError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_invalid_image_surfaces_as_detection_error() {
        let engine = handle();
        let err = engine.evaluate(vec![1, 2, 3], EvaluationMode::WholeImage).await.unwrap_err();
        assert!(matches!(err, EngineError::Detection(DetectionError::InvalidImage(_))));
    }
}
