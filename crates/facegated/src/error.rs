use crate::response::MatchResponse;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use facegate_core::{ExtractError, MatchError};
use facegate_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Seconds a client should wait before retrying a 503.
const RETRY_AFTER_SECS: &str = "5";

/// Every way a match request can fail.
#[derive(Error, Debug)]
pub enum MatchRequestError {
    #[error("no image provided")]
    MissingImage,
    #[error("more than one image provided")]
    MultipleImages,
    #[error("upload exceeds the size limit")]
    PayloadTooLarge,
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("{0} faces detected")]
    MultipleFaces(usize),
    #[error("image could not be decoded: {0}")]
    Decode(String),
    #[error("profile store unavailable")]
    StoreUnavailable,
    #[error("face models are not loaded")]
    ModelNotReady,
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("enrollment data integrity: {0}")]
    DataIntegrity(String),
    #[error("profile store error: {0}")]
    Storage(String),
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingImage,
    MultipleImages,
    #[serde(rename = "IMAGE_TOO_LARGE")]
    PayloadTooLarge,
    MalformedRequest,
    NoFaceDetected,
    MultipleFaces,
    DecodeError,
    StoreUnavailable,
    ModelNotReady,
    InferenceFailed,
    DataIntegrity,
    StoreError,
}

impl MatchRequestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingImage => ErrorCode::MissingImage,
            Self::MultipleImages => ErrorCode::MultipleImages,
            Self::PayloadTooLarge => ErrorCode::PayloadTooLarge,
            Self::MalformedRequest(_) => ErrorCode::MalformedRequest,
            Self::NoFaceDetected => ErrorCode::NoFaceDetected,
            Self::MultipleFaces(_) => ErrorCode::MultipleFaces,
            Self::Decode(_) => ErrorCode::DecodeError,
            Self::StoreUnavailable => ErrorCode::StoreUnavailable,
            Self::ModelNotReady => ErrorCode::ModelNotReady,
            Self::Inference(_) => ErrorCode::InferenceFailed,
            Self::DataIntegrity(_) => ErrorCode::DataIntegrity,
            Self::Storage(_) => ErrorCode::StoreError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingImage
            | Self::MultipleImages
            | Self::MalformedRequest(_)
            | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NoFaceDetected | Self::MultipleFaces(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ModelNotReady | Self::Inference(_) | Self::DataIntegrity(_) | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the person in front of the camera.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingImage => "No image provided. Please capture a photo first.".into(),
            Self::MultipleImages => "Please send exactly one photo.".into(),
            Self::PayloadTooLarge => {
                "The photo is too large. Please capture a smaller image.".into()
            }
            Self::MalformedRequest(_) => "The upload could not be read. Please try again.".into(),
            Self::NoFaceDetected => "No face detected in the image. Please ensure your face is \
                                     clearly visible and try again."
                .into(),
            Self::MultipleFaces(n) => {
                format!("{n} faces detected. Please make sure only you are in the photo.")
            }
            Self::Decode(_) => "The image could not be read. Please capture a new photo.".into(),
            Self::StoreUnavailable => {
                "Database is reconnecting. Please try again in a few seconds.".into()
            }
            Self::ModelNotReady
            | Self::Inference(_)
            | Self::DataIntegrity(_)
            | Self::Storage(_) => "An internal error occurred".into(),
        }
    }
}

impl From<ExtractError> for MatchRequestError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Decode(msg) => Self::Decode(msg),
            ExtractError::NoFaceDetected => Self::NoFaceDetected,
            ExtractError::MultipleFaces(n) => Self::MultipleFaces(n),
            ExtractError::ModelNotReady => Self::ModelNotReady,
            ExtractError::Detector(e) => Self::Inference(e.to_string()),
            ExtractError::Recognizer(e) => Self::Inference(e.to_string()),
        }
    }
}

impl From<StoreError> for MatchRequestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { .. } => Self::StoreUnavailable,
            StoreError::MalformedProfile { .. } | StoreError::InvalidProfile(_) => {
                Self::DataIntegrity(err.to_string())
            }
            StoreError::Database(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<MatchError> for MatchRequestError {
    fn from(err: MatchError) -> Self {
        Self::DataIntegrity(err.to_string())
    }
}

impl IntoResponse for MatchRequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = ?self.code(), "match request failed");
        } else {
            tracing::info!(error = %self, code = ?self.code(), "match request rejected");
        }

        let body = MatchResponse::failure(self.code(), self.user_message());
        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, Self::StoreUnavailable) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_store_unavailable_is_retryable_503() {
        let err = MatchRequestError::from(StoreError::Unavailable {
            waited: Duration::from_secs(25),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);

        let response = err.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], RETRY_AFTER_SECS);
    }

    #[test]
    fn test_client_errors_are_4xx() {
        for err in [
            MatchRequestError::MissingImage,
            MatchRequestError::MultipleImages,
            MatchRequestError::NoFaceDetected,
            MatchRequestError::MultipleFaces(2),
            MatchRequestError::Decode("bad".into()),
        ] {
            assert!(err.status().is_client_error(), "{err:?}");
        }
    }

    #[test]
    fn test_integrity_errors_are_5xx_and_hide_details() {
        let err = MatchRequestError::from(MatchError::DimensionMismatch {
            profile_id: "p9".into(),
            expected: 128,
            actual: 512,
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), ErrorCode::DataIntegrity);
        assert!(!err.user_message().contains("p9"));
    }

    #[test]
    fn test_extract_errors_map_to_distinct_kinds() {
        assert!(matches!(
            MatchRequestError::from(ExtractError::NoFaceDetected),
            MatchRequestError::NoFaceDetected
        ));
        assert!(matches!(
            MatchRequestError::from(ExtractError::Decode("x".into())),
            MatchRequestError::Decode(_)
        ));
        assert!(matches!(
            MatchRequestError::from(ExtractError::ModelNotReady),
            MatchRequestError::ModelNotReady
        ));
    }

    #[test]
    fn test_database_failure_is_non_retryable_store_error() {
        let err = MatchRequestError::from(StoreError::Database(
            tokio_rusqlite::Error::ConnectionClosed,
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), ErrorCode::StoreError);
        let response = err.into_response();
        assert!(!response.headers().contains_key(header::RETRY_AFTER));
    }

    #[test]
    fn test_payload_too_large_is_413() {
        let err = MatchRequestError::PayloadTooLarge;
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            serde_json::to_value(err.code()).unwrap(),
            serde_json::json!("IMAGE_TOO_LARGE")
        );
    }
}
