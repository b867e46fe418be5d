//! Face recognizer via ONNX Runtime.
//!
//! Turns an aligned 112×112 RGB crop into an L2-normalized descriptor whose
//! length must equal the configured dimensionality.

use crate::alignment::ALIGNED_SIZE;
use crate::types::FaceDescriptor;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const RECOGNIZER_MEAN: f32 = 127.5;
const RECOGNIZER_STD: f32 = 127.5;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("recognizer model not found: {0}")]
    ModelNotFound(String),
    #[error("recognizer inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct FaceRecognizer {
    session: Session,
    descriptor_dim: usize,
}

impl FaceRecognizer {
    /// Load the recognition model; `descriptor_dim` is the expected output length.
    pub fn load(model_path: &Path, descriptor_dim: usize) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            descriptor_dim,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded recognition model"
        );

        Ok(Self { session, descriptor_dim })
    }

    pub fn descriptor_dim(&self) -> usize {
        self.descriptor_dim
    }

    /// Compute the descriptor of an aligned face crop.
    pub fn describe(&mut self, aligned: &RgbImage) -> Result<FaceDescriptor, RecognizerError> {
        let input = preprocess(aligned);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("descriptor output: {e}")))?;

        if raw.len() != self.descriptor_dim {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {}-dim descriptor, model produced {}",
                self.descriptor_dim,
                raw.len()
            )));
        }

        FaceDescriptor::new(l2_normalize(raw))
            .map_err(|e| RecognizerError::InferenceFailed(e.to_string()))
    }
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

/// Aligned RGB crop → normalized NCHW tensor.
fn preprocess(aligned: &RgbImage) -> Array4<f32> {
    let size = ALIGNED_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in aligned.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= size || y >= size {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, y, x]] = (pixel[c] as f32 - RECOGNIZER_MEAN) / RECOGNIZER_STD;
        }
    }
    tensor
}
