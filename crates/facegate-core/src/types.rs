use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Metadata keys that could carry biometric data and are never exposed.
const DESCRIPTOR_KEYS: [&str; 3] = ["faceDescriptor", "face_descriptor", "descriptor"];
/// Keys owned by [`PublicProfile`] itself; metadata may not shadow them.
const RESERVED_KEYS: [&str; 3] = ["id", "name", "createdAt"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("descriptor is empty")]
    Empty,
    #[error("descriptor value at index {index} is not finite")]
    NotFinite { index: usize },
}

/// Fixed-length face descriptor produced by the recognition model.
///
/// Construction rejects empty vectors and non-finite components, so every
/// distance computed between two descriptors of equal length is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDescriptor {
    values: Vec<f32>,
}

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Result<Self, DescriptorError> {
        if values.is_empty() {
            return Err(DescriptorError::Empty);
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(DescriptorError::NotFinite { index });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance, or `None` when the dimensionalities differ.
    pub fn euclidean_distance(&self, other: &FaceDescriptor) -> Option<f32> {
        if self.values.len() != other.values.len() {
            return None;
        }
        let sum: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Some(sum.sqrt())
    }
}

/// An enrolled profile as held by the store.
///
/// Not `Serialize`: the only way out of the process is
/// [`Profile::to_public`].
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub metadata: Map<String, Value>,
    pub descriptor: FaceDescriptor,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Project the profile to its externally visible form.
    pub fn to_public(&self) -> PublicProfile {
        let mut metadata = self.metadata.clone();
        for key in RESERVED_KEYS {
            metadata.remove(key);
        }
        strip_descriptor_keys(&mut metadata);
        PublicProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            metadata,
        }
    }
}

/// Remove descriptor-named keys at every depth, including inside arrays.
fn strip_descriptor_keys(map: &mut Map<String, Value>) {
    for key in DESCRIPTOR_KEYS {
        map.remove(key);
    }
    for value in map.values_mut() {
        strip_value(value);
    }
}

fn strip_value(value: &mut Value) {
    match value {
        Value::Object(map) => strip_descriptor_keys(map),
        Value::Array(items) => items.iter_mut().for_each(strip_value),
        _ => {}
    }
}

/// Profile without its descriptor, safe to return to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Outcome of comparing a query descriptor against the enrolled profiles.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched {
        profile: PublicProfile,
        distance: f32,
        confidence: f32,
    },
    NoMatch {
        /// Distance of the closest rejected candidate, if there was one.
        closest_distance: Option<f32>,
    },
}
