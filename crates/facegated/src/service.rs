//! The match pipeline: readiness → extract → list → compare.

use crate::error::MatchRequestError;
use facegate_core::{DescriptorExtractor, EuclideanMatcher, MatchPolicy, MatchResult, Matcher};
use facegate_store::ProfileGateway;
use std::sync::Arc;
use std::time::Duration;

pub struct MatchService {
    extractor: Arc<dyn DescriptorExtractor>,
    profiles: Arc<dyn ProfileGateway>,
    policy: MatchPolicy,
    store_ready_timeout: Duration,
}

impl MatchService {
    pub fn new(
        extractor: Arc<dyn DescriptorExtractor>,
        profiles: Arc<dyn ProfileGateway>,
        policy: MatchPolicy,
        store_ready_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            profiles,
            policy,
            store_ready_timeout,
        }
    }

    pub fn profiles(&self) -> &dyn ProfileGateway {
        self.profiles.as_ref()
    }

    pub fn descriptor_dim(&self) -> usize {
        self.extractor.descriptor_dim()
    }

    /// Run one match request end to end.
    pub async fn match_image(&self, image: Option<Vec<u8>>) -> Result<MatchResult, MatchRequestError> {
        let image = image
            .filter(|bytes| !bytes.is_empty())
            .ok_or(MatchRequestError::MissingImage)?;

        self.profiles.await_ready(self.store_ready_timeout).await?;

        let query = self.extractor.extract(image).await?;
        let candidates = self.profiles.list_profiles().await?;

        let result = EuclideanMatcher.compare(&query, &candidates, &self.policy)?;

        match &result {
            MatchResult::Matched { profile, distance, confidence } => tracing::info!(
                profile_id = %profile.id,
                distance,
                confidence,
                candidates = candidates.len(),
                "face matched"
            ),
            MatchResult::NoMatch { closest_distance } => tracing::info!(
                closest_distance = ?closest_distance,
                threshold = self.policy.threshold,
                candidates = candidates.len(),
                "no matching profile"
            ),
        }

        Ok(result)
    }
}
