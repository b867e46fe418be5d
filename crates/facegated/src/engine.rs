use async_trait::async_trait;
use facegate_core::detector::DetectorError;
use facegate_core::recognizer::RecognizerError;
use facegate_core::{
    DescriptorExtractor, ExtractError, FaceAnalyzer, FaceDescriptor, FaceDetector, FaceRecognizer,
    MultiFacePolicy,
};
use std::path::Path;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Pending extraction requests the engine will queue before callers block.
const ENGINE_QUEUE_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct ExtractRequest {
    image: Vec<u8>,
    reply: oneshot::Sender<Result<FaceDescriptor, ExtractError>>,
}

/// Clone-safe handle to the inference thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<ExtractRequest>,
    descriptor_dim: usize,
}

#[async_trait]
impl DescriptorExtractor for EngineHandle {
    async fn extract(&self, image: Vec<u8>) -> Result<FaceDescriptor, ExtractError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ExtractRequest { image, reply: reply_tx })
            .await
            .map_err(|_| ExtractError::ModelNotReady)?;
        reply_rx.await.map_err(|_| ExtractError::ModelNotReady)?
    }

    fn descriptor_dim(&self) -> usize {
        self.descriptor_dim
    }
}

/// Load both models and start the inference thread.
///
/// Fails fast if either model is missing or unloadable, so the daemon never
/// accepts traffic without a working extractor.
pub fn spawn_engine(
    detector_path: &Path,
    recognizer_path: &Path,
    descriptor_dim: usize,
    multi_face: MultiFacePolicy,
) -> Result<EngineHandle, EngineError> {
    let detector = FaceDetector::load(detector_path)?;
    tracing::info!(path = %detector_path.display(), "SCRFD detector loaded");

    let recognizer = FaceRecognizer::load(recognizer_path, descriptor_dim)?;
    tracing::info!(path = %recognizer_path.display(), descriptor_dim, "recognizer loaded");

    let mut analyzer = FaceAnalyzer::new(detector, recognizer, multi_face);
    let (tx, mut rx) = mpsc::channel::<ExtractRequest>(ENGINE_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(ExtractRequest { image, reply }) = rx.blocking_recv() {
                let started = std::time::Instant::now();
                let result = analyzer.analyze(&image);
                tracing::debug!(
                    bytes = image.len(),
                    ok = result.is_ok(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "extraction finished"
                );
                // Receiver gone means the request was abandoned upstream.
                let _ = reply.send(result);
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx, descriptor_dim })
}
