//! Nearest-neighbour matching of a query descriptor against enrolled profiles.

use crate::types::{FaceDescriptor, MatchResult, Profile};
use thiserror::Error;

/// Default Euclidean distance threshold for 128-d descriptors.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// Enrollment and extraction used incompatible models.
    #[error("profile {profile_id} has a {actual}-dim descriptor, query is {expected}-dim")]
    DimensionMismatch {
        profile_id: String,
        expected: usize,
        actual: usize,
    },
}

/// Acceptance policy: distance threshold plus the distance → confidence mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// A candidate is accepted only when its distance is strictly below this.
    pub threshold: f32,
}

impl MatchPolicy {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn accepts(&self, distance: f32) -> bool {
        distance < self.threshold
    }

    /// Confidence in [0, 1]: `1 - distance`, clamped.
    pub fn confidence(&self, distance: f32) -> f32 {
        (1.0 - distance).clamp(0.0, 1.0)
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

/// Strategy for comparing a query descriptor against a set of candidates.
pub trait Matcher {
    fn compare(
        &self,
        query: &FaceDescriptor,
        candidates: &[Profile],
        policy: &MatchPolicy,
    ) -> Result<MatchResult, MatchError>;
}

/// Euclidean nearest-neighbour matcher.
///
/// Visits every candidate with no early exit. On equal minimal distance the
/// earliest candidate wins, so the result depends only on the input order.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        query: &FaceDescriptor,
        candidates: &[Profile],
        policy: &MatchPolicy,
    ) -> Result<MatchResult, MatchError> {
        let mut best: Option<(usize, f32)> = None;

        for (i, profile) in candidates.iter().enumerate() {
            let distance = query.euclidean_distance(&profile.descriptor).ok_or_else(|| {
                MatchError::DimensionMismatch {
                    profile_id: profile.id.clone(),
                    expected: query.len(),
                    actual: profile.descriptor.len(),
                }
            })?;

            tracing::trace!(profile_id = %profile.id, distance, "candidate distance");

            // Strict comparison: first occurrence wins ties.
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        Ok(match best {
            Some((idx, distance)) if policy.accepts(distance) => MatchResult::Matched {
                profile: candidates[idx].to_public(),
                distance,
                confidence: policy.confidence(distance),
            },
            Some((_, distance)) => MatchResult::NoMatch {
                closest_distance: Some(distance),
            },
            None => MatchResult::NoMatch {
                closest_distance: None,
            },
        })
    }
}
