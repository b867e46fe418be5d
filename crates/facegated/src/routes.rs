use crate::error::MatchRequestError;
use crate::response::MatchResponse;
use crate::state::AppState;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Multipart field carrying the captured photo.
const IMAGE_FIELD: &str = "image";

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    features: Features,
    store_ready: bool,
    descriptor_dim: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Features {
    face_recognition: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        features: Features {
            face_recognition: true,
        },
        store_ready: state.service.profiles().is_ready(),
        descriptor_dim: state.service.descriptor_dim(),
    })
}

/// POST /api/face/match
///
/// Accepts a multipart form with one `image` field and reports which enrolled
/// profile, if any, the photo belongs to.
async fn match_face(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MatchResponse>, MatchRequestError> {
    // Not a multipart body at all: nothing was uploaded.
    let multipart = multipart.map_err(|_| MatchRequestError::MissingImage)?;
    let image = read_image_field(multipart).await?;

    tracing::info!(
        bytes = image.as_ref().map_or(0, Vec::len),
        "face match request received"
    );

    let result = state.service.match_image(image).await?;
    Ok(Json(MatchResponse::from(result)))
}

fn multipart_error(err: MultipartError) -> MatchRequestError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        MatchRequestError::PayloadTooLarge
    } else {
        MatchRequestError::MalformedRequest(err.body_text())
    }
}

async fn read_image_field(mut multipart: Multipart) -> Result<Option<Vec<u8>>, MatchRequestError> {
    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        if image.is_some() {
            return Err(MatchRequestError::MultipleImages);
        }
        let bytes = field.bytes().await.map_err(multipart_error)?;
        image = Some(bytes.to_vec());
    }
    Ok(image)
}

/// Full application router with its middleware stack.
pub fn app(state: AppState, max_upload_bytes: usize, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/face/match", post(match_face))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
