#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use facegate_core::{DescriptorExtractor, ExtractError, FaceDescriptor, MatchPolicy};
use facegate_store::{ProfileGateway, ProfileStore};
use facegated::{routes, AppState, MatchService};
use http_body_util::BodyExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DIM: usize = 4;
pub const BOUNDARY: &str = "facegate-test-boundary";

/// Enrolled descriptor for "Ahana".
pub const AHANA: [f32; DIM] = [0.10, 0.25, -0.05, 0.40];
/// Another photo of the same person.
pub const AHANA_AGAIN: [f32; DIM] = [0.13, 0.22, -0.02, 0.37];
/// Someone else entirely.
pub const STRANGER: [f32; DIM] = [-0.60, 0.50, 0.70, -0.30];

/// Extractor that decides by image content instead of running models.
///
/// `ahana`, `ahana-again` and `stranger` map to the descriptors above,
/// `blank` has no face, `three-dim` yields a descriptor of the wrong length,
/// anything else fails to decode.
#[derive(Default)]
pub struct FakeExtractor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl DescriptorExtractor for FakeExtractor {
    async fn extract(&self, image: Vec<u8>) -> Result<FaceDescriptor, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let values = match image.as_slice() {
            b"ahana" => AHANA.to_vec(),
            b"ahana-again" => AHANA_AGAIN.to_vec(),
            b"stranger" => STRANGER.to_vec(),
            b"three-dim" => vec![0.1, 0.2, 0.3],
            b"blank" => return Err(ExtractError::NoFaceDetected),
            _ => return Err(ExtractError::Decode("unsupported image format".into())),
        };
        Ok(FaceDescriptor::new(values).expect("finite test descriptor"))
    }

    fn descriptor_dim(&self) -> usize {
        DIM
    }
}

pub fn descriptor(values: [f32; DIM]) -> FaceDescriptor {
    FaceDescriptor::new(values.to_vec()).unwrap()
}

pub fn build_app(
    extractor: Arc<FakeExtractor>,
    gateway: Arc<dyn ProfileGateway>,
    store_ready_timeout: Duration,
) -> Router {
    build_app_with_limit(extractor, gateway, store_ready_timeout, 1024 * 1024)
}

pub fn build_app_with_limit(
    extractor: Arc<FakeExtractor>,
    gateway: Arc<dyn ProfileGateway>,
    store_ready_timeout: Duration,
    max_upload_bytes: usize,
) -> Router {
    let service = MatchService::new(extractor, gateway, MatchPolicy::default(), store_ready_timeout);
    routes::app(AppState::new(service), max_upload_bytes, Duration::from_secs(30))
}

pub async fn ready_store() -> ProfileStore {
    ProfileStore::open_in_memory(DIM).await.unwrap()
}

/// A multipart match request carrying the given `(field name, bytes)` parts.
pub fn match_request(fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, data) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.jpg\"\r\n\
                 Content-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/face/match")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn parse(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap()
}
