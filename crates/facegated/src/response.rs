//! Externally visible response bodies.

use crate::error::ErrorCode;
use facegate_core::{MatchResult, PublicProfile};
use serde::Serialize;

pub const NO_MATCH_MESSAGE: &str = "No matching profile found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Matched,
    NoMatch,
    Error,
}

/// Body of every `/api/face/match` response.
///
/// `outcome` tells "matched", "nobody matched" and "the system failed" apart;
/// `error` carries a stable code on failures.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    pub success: bool,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<PublicProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl MatchResponse {
    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: Outcome::Error,
            profile: None,
            confidence: None,
            message: Some(message.into()),
            error: Some(code),
        }
    }
}

impl From<MatchResult> for MatchResponse {
    fn from(result: MatchResult) -> Self {
        match result {
            MatchResult::Matched { profile, confidence, .. } => Self {
                success: true,
                outcome: Outcome::Matched,
                profile: Some(profile),
                confidence: Some(confidence),
                message: None,
                error: None,
            },
            MatchResult::NoMatch { .. } => Self {
                success: false,
                outcome: Outcome::NoMatch,
                profile: None,
                confidence: None,
                message: Some(NO_MATCH_MESSAGE.to_string()),
                error: None,
            },
        }
    }
}
