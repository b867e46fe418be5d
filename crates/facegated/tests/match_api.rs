//! Integration tests for the match endpoint and health route.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::*;
use facegate_store::{NewProfile, ProfileStore};
use serde_json::{json, Map};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn enroll_ahana(store: &ProfileStore) -> String {
    let mut metadata = Map::new();
    metadata.insert("relation".into(), json!("sister"));
    metadata.insert("faceDescriptor".into(), json!([1.0, 2.0]));
    metadata.insert(
        "enrollment".into(),
        json!({"source": "kiosk", "faceDescriptor": [0.11, 0.22]}),
    );
    store
        .insert_profile(NewProfile {
            name: "Ahana".into(),
            metadata,
            descriptor: descriptor(AHANA),
        })
        .await
        .unwrap()
        .id
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_store_readiness() {
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(ready_store().await),
        Duration::from_secs(1),
    );
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = parse(&body_text(response).await);
    assert_eq!(json["status"], "running");
    assert_eq!(json["store_ready"], true);
    assert_eq!(json["features"]["faceRecognition"], true);
    assert_eq!(json["descriptor_dim"], DIM);
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn same_person_matches_without_leaking_descriptor() {
    let store = ready_store().await;
    let ahana_id = enroll_ahana(&store).await;
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(store),
        Duration::from_secs(1),
    );

    let response = app.oneshot(match_request(&[("image", "ahana-again")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert!(!text.contains("faceDescriptor"), "descriptor leaked: {text}");
    assert!(!text.contains("face_descriptor"), "descriptor leaked: {text}");

    let json = parse(&text);
    assert_eq!(json["success"], true);
    assert_eq!(json["outcome"], "matched");
    assert_eq!(json["profile"]["id"], ahana_id.as_str());
    assert_eq!(json["profile"]["name"], "Ahana");
    assert_eq!(json["profile"]["relation"], "sister");
    assert_eq!(json["profile"]["enrollment"]["source"], "kiosk");
    assert!(json["confidence"].as_f64().unwrap() > 0.5);
}

#[tokio::test]
async fn identical_descriptor_matches_with_full_confidence() {
    let store = ready_store().await;
    enroll_ahana(&store).await;
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(store),
        Duration::from_secs(1),
    );

    let response = app.oneshot(match_request(&[("image", "ahana")])).await.unwrap();
    let json = parse(&body_text(response).await);
    assert_eq!(json["outcome"], "matched");
    assert_eq!(json["confidence"], 1.0);
}

#[tokio::test]
async fn unrelated_face_is_no_match_not_error() {
    let store = ready_store().await;
    enroll_ahana(&store).await;
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(store),
        Duration::from_secs(1),
    );

    let response = app.oneshot(match_request(&[("image", "stranger")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = parse(&body_text(response).await);
    assert_eq!(json["success"], false);
    assert_eq!(json["outcome"], "no_match");
    assert!(json.get("error").is_none());
    assert!(json.get("profile").is_none());
}

#[tokio::test]
async fn empty_store_is_no_match() {
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(ready_store().await),
        Duration::from_secs(1),
    );
    let response = app.oneshot(match_request(&[("image", "ahana")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse(&body_text(response).await)["outcome"], "no_match");
}

// ---------------------------------------------------------------------------
// Client errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_image_field_is_rejected() {
    let extractor = Arc::new(FakeExtractor::default());
    let app = build_app(extractor.clone(), Arc::new(ready_store().await), Duration::from_secs(1));

    let response = app.oneshot(match_request(&[("note", "hello")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = parse(&body_text(response).await);
    assert_eq!(json["outcome"], "error");
    assert_eq!(json["error"], "MISSING_IMAGE");
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_image_field_is_rejected() {
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(ready_store().await),
        Duration::from_secs(1),
    );
    let response = app.oneshot(match_request(&[("image", "")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body_text(response).await)["error"], "MISSING_IMAGE");
}

#[tokio::test]
async fn non_multipart_body_is_missing_image() {
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(ready_store().await),
        Duration::from_secs(1),
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/face/match")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body_text(response).await)["error"], "MISSING_IMAGE");
}

#[tokio::test]
async fn two_images_are_rejected() {
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(ready_store().await),
        Duration::from_secs(1),
    );
    let response = app
        .oneshot(match_request(&[("image", "ahana"), ("image", "stranger")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body_text(response).await)["error"], "MULTIPLE_IMAGES");
}

#[tokio::test]
async fn oversized_upload_is_413_not_malformed() {
    let extractor = Arc::new(FakeExtractor::default());
    let app = build_app_with_limit(
        extractor.clone(),
        Arc::new(ready_store().await),
        Duration::from_secs(1),
        64,
    );
    let photo = "x".repeat(4096);

    let response = app.oneshot(match_request(&[("image", photo.as_str())])).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = parse(&body_text(response).await);
    assert_eq!(json["outcome"], "error");
    assert_eq!(json["error"], "IMAGE_TOO_LARGE");
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upload_within_limit_is_accepted() {
    let app = build_app_with_limit(
        Arc::new(FakeExtractor::default()),
        Arc::new(ready_store().await),
        Duration::from_secs(1),
        4096,
    );
    let response = app.oneshot(match_request(&[("image", "ahana")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn no_face_gets_actionable_message() {
    let store = ready_store().await;
    enroll_ahana(&store).await;
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(store),
        Duration::from_secs(1),
    );

    let response = app.oneshot(match_request(&[("image", "blank")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let text = body_text(response).await;
    assert!(!text.contains("faceDescriptor"));
    let json = parse(&text);
    assert_eq!(json["error"], "NO_FACE_DETECTED");
    assert!(json["message"].as_str().unwrap().contains("No face detected"));
}

#[tokio::test]
async fn undecodable_image_is_bad_request() {
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(ready_store().await),
        Duration::from_secs(1),
    );
    let response = app.oneshot(match_request(&[("image", "\u{0}\u{1}garbage")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body_text(response).await)["error"], "DECODE_ERROR");
}

// ---------------------------------------------------------------------------
// Server-side failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_store_is_retryable_503() {
    let store = ProfileStore::connect(
        PathBuf::from("/nonexistent-facegate-dir/profiles.d"),
        DIM,
        Duration::from_millis(20),
    );
    let extractor = Arc::new(FakeExtractor::default());
    let app = build_app(extractor.clone(), Arc::new(store), Duration::from_millis(100));

    let response = app.oneshot(match_request(&[("image", "ahana")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let json = parse(&body_text(response).await);
    assert_eq!(json["error"], "STORE_UNAVAILABLE");
    assert_eq!(json["outcome"], "error");
    // Readiness is checked before any inference runs.
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn incompatible_descriptor_length_fails_loudly() {
    let store = ready_store().await;
    let ahana_id = enroll_ahana(&store).await;
    let app = build_app(
        Arc::new(FakeExtractor::default()),
        Arc::new(store),
        Duration::from_secs(1),
    );

    let response = app.oneshot(match_request(&[("image", "three-dim")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(response).await;
    assert!(!text.contains(&ahana_id));
    assert_eq!(parse(&text)["error"], "DATA_INTEGRITY");
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_store() {
    let store = ready_store().await;
    let ahana_id = enroll_ahana(&store).await;
    let extractor = Arc::new(FakeExtractor::default());
    let app = build_app(extractor.clone(), Arc::new(store), Duration::from_secs(1));

    let requests: Vec<_> = (0..16)
        .map(|i| {
            let app = app.clone();
            let image = if i % 2 == 0 { "ahana-again" } else { "stranger" };
            tokio::spawn(async move {
                let response = app.oneshot(match_request(&[("image", image)])).await.unwrap();
                (i, parse(&body_text(response).await))
            })
        })
        .collect();

    for request in requests {
        let (i, json) = request.await.unwrap();
        if i % 2 == 0 {
            assert_eq!(json["profile"]["id"], ahana_id.as_str());
        } else {
            assert_eq!(json["outcome"], "no_match");
        }
    }
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 16);
}
