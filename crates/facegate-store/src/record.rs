//! Row ↔ [`Profile`] conversion with boundary validation.

use crate::StoreError;
use chrono::{DateTime, Utc};
use facegate_core::{FaceDescriptor, Profile};
use serde_json::{Map, Value};

/// A `profiles` row exactly as stored, before validation.
#[derive(Debug, Clone)]
pub(crate) struct ProfileRow {
    pub id: String,
    pub name: String,
    pub metadata: String,
    pub face_descriptor: String,
    pub created_at: String,
}

impl ProfileRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            metadata: row.get(2)?,
            face_descriptor: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    /// Validate and convert; any defect names the offending profile.
    pub fn into_profile(self, descriptor_dim: usize) -> Result<Profile, StoreError> {
        let malformed = |reason: String| StoreError::MalformedProfile {
            id: self.id.clone(),
            reason,
        };

        let values: Vec<f32> = serde_json::from_str(&self.face_descriptor)
            .map_err(|e| malformed(format!("descriptor is not a float array: {e}")))?;
        if values.len() != descriptor_dim {
            return Err(malformed(format!(
                "descriptor has {} values, expected {descriptor_dim}",
                values.len()
            )));
        }
        let descriptor = FaceDescriptor::new(values).map_err(|e| malformed(e.to_string()))?;

        let metadata: Map<String, Value> = serde_json::from_str(&self.metadata)
            .map_err(|e| malformed(format!("metadata is not a JSON object: {e}")))?;

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| malformed(format!("bad created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(Profile {
            id: self.id,
            name: self.name,
            metadata,
            descriptor,
            created_at,
        })
    }
}

pub(crate) fn encode_descriptor(descriptor: &FaceDescriptor) -> String {
    Value::from(descriptor.values().to_vec()).to_string()
}
