//! Image bytes → face descriptor.

use crate::alignment;
use crate::detector::{DetectorError, FaceBox, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::FaceDescriptor;
use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("{0} faces detected, expected exactly one")]
    MultipleFaces(usize),
    /// The inference engine is not running. Only reachable if the engine
    /// died after startup.
    #[error("face models are not loaded")]
    ModelNotReady,
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Anything that can turn raw image bytes into a descriptor.
#[async_trait]
pub trait DescriptorExtractor: Send + Sync {
    async fn extract(&self, image: Vec<u8>) -> Result<FaceDescriptor, ExtractError>;

    /// Length of the descriptors this extractor produces.
    fn descriptor_dim(&self) -> usize;
}

/// How to proceed when the detector returns more than one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiFacePolicy {
    /// Use the largest face.
    #[default]
    Largest,
    /// Fail with [`ExtractError::MultipleFaces`].
    Reject,
}

/// Pick the face to describe: largest box area, earliest on ties.
///
/// Detections arrive sorted by confidence, so a tie resolves to the more
/// confident face.
pub fn select_primary_face(faces: &[FaceBox]) -> Option<&FaceBox> {
    faces.iter().fold(None, |best: Option<&FaceBox>, face| match best {
        Some(b) if face.area() <= b.area() => Some(b),
        _ => Some(face),
    })
}

/// Decode compressed image bytes (JPEG, PNG, WebP, ...) into RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ExtractError> {
    let image = image::load_from_memory(bytes).map_err(|e| ExtractError::Decode(e.to_string()))?;
    Ok(image.to_rgb8())
}

/// Detector + recognizer pair; owns the loaded ONNX sessions.
pub struct FaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    multi_face: MultiFacePolicy,
}

impl FaceAnalyzer {
    pub fn new(detector: FaceDetector, recognizer: FaceRecognizer, multi_face: MultiFacePolicy) -> Self {
        Self { detector, recognizer, multi_face }
    }

    pub fn descriptor_dim(&self) -> usize {
        self.recognizer.descriptor_dim()
    }

    /// Decode, detect, select one face, align and describe it.
    pub fn analyze(&mut self, bytes: &[u8]) -> Result<FaceDescriptor, ExtractError> {
        let image = decode_image(bytes)?;
        tracing::debug!(width = image.width(), height = image.height(), "decoded image");

        let faces = self.detector.detect(&image)?;
        if faces.len() > 1 && self.multi_face == MultiFacePolicy::Reject {
            return Err(ExtractError::MultipleFaces(faces.len()));
        }
        let face = select_primary_face(&faces).ok_or(ExtractError::NoFaceDetected)?;

        tracing::debug!(
            detected = faces.len(),
            confidence = face.confidence,
            width = face.width,
            height = face.height,
            "selected face"
        );

        let aligned = alignment::align_face(&image, &face.landmarks);
        Ok(self.recognizer.describe(&aligned)?)
    }
}
