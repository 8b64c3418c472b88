//! End-to-end scenarios against the in-process router (stub engine only —
//! see `SPEC_FULL.md` §8's concrete end-to-end scenario list).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use whisper_server_lib::config::EffectiveConfig;
use whisper_server_lib::http::{build_router, AppState};

/// Build an `AppState` whose configured model is already present on disk,
/// so tests exercise the request pipeline without touching the network.
fn test_state() -> AppState {
    // `keep` intentionally leaks the directory instead of deleting it when
    // this function returns, since `AppState` only holds the path.
    let dir = tempfile::tempdir().unwrap().keep();
    let config = EffectiveConfig { max_concurrent: 1, queue_wait_sec: 1, ..EffectiveConfig::default() };
    seed_model_file(&dir, &config.model_id);
    AppState::new(config, dir)
}

fn seed_model_file(models_dir: &std::path::Path, model_id: &str) {
    std::fs::create_dir_all(models_dir).unwrap();
    std::fs::write(models_dir.join(format!("{model_id}.bin")), vec![0u8; 2048]).unwrap();
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn write_wav_bytes(sample_rate: u32, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let total_frames = (sample_rate as f32 * seconds) as u32;
        for i in 0..total_frames {
            writer.write_sample(((i % 200) as i16) - 100).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[tokio::test]
async fn health_returns_ok_with_a_version() {
    let router = build_router(test_state());
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(!json["version"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn models_list_contains_whisper_base() {
    let router = build_router(test_state());
    let response = router
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["object"], "list");
    let ids: Vec<&str> = json["data"].as_array().unwrap().iter().map(|e| e["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&"whisper-base"));
}

#[tokio::test]
async fn config_echo_reports_defaults() {
    let router = build_router(test_state());
    let response = router
        .oneshot(Request::builder().uri("/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["modelId"], "whisper-base");
    assert_eq!(json["port"], 8000);
}

#[tokio::test]
async fn unknown_model_route_is_not_found() {
    let router = build_router(test_state());
    let response = router
        .oneshot(Request::builder().uri("/v1/models/whisper-xxl").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "model_not_found");
}

#[tokio::test]
async fn multipart_without_a_file_field_is_rejected() {
    let router = build_router(test_state());
    let body = "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"language\"\r\n\r\nen\r\n--XBOUNDARY--\r\n";
    let request = Request::builder()
        .method("POST")
        .uri("/v1/audio/transcriptions")
        .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "invalid_request_error");
}

/// A multipart route hit with the wrong `Content-Type` must still come back
/// through the JSON error envelope, not axum's own plain-text rejection body.
#[tokio::test]
async fn multipart_route_with_wrong_content_type_is_rejected_as_json() {
    let router = build_router(test_state());
    let request = Request::builder()
        .method("POST")
        .uri("/v1/audio/transcriptions")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "invalid_request_error");
}

/// A JSON route hit with a malformed body must also come back through the
/// JSON error envelope rather than axum's own rejection.
#[tokio::test]
async fn base64_route_with_malformed_json_is_rejected_as_json() {
    let router = build_router(test_state());
    let request = Request::builder()
        .method("POST")
        .uri("/v1/audio/transcriptions/base64")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn base64_transcription_round_trips_through_the_stub_engine() {
    let router = build_router(test_state());
    let wav = write_wav_bytes(16_000, 1.0);
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &wav);
    let payload = serde_json::json!({"audio": encoded, "filename": "clip.wav"});
    let request = Request::builder()
        .method("POST")
        .uri("/v1/audio/transcriptions/base64")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["text"].as_str().unwrap().contains("stub transcript"));
    assert_eq!(json["language"], "auto");
    let segments = json["segments"].as_array().unwrap();
    assert!(!segments.is_empty());
    let starts: Vec<f64> = segments.iter().map(|s| s["start"].as_f64().unwrap()).collect();
    assert!(starts.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn base64_oversize_payload_is_rejected_with_413() {
    let dir = tempfile::tempdir().unwrap();
    let config = EffectiveConfig { max_file_size_mb: 1, ..EffectiveConfig::default() };
    let state = AppState::new(config, dir.path().to_path_buf());
    let router = build_router(state);

    let oversized = vec![0u8; 2 * 1024 * 1024];
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &oversized);
    let payload = serde_json::json!({"audio": encoded, "filename": "clip.wav"});
    let request = Request::builder()
        .method("POST")
        .uri("/v1/audio/transcriptions/base64")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "file_too_large");
}

#[tokio::test]
async fn unsupported_extension_is_rejected_with_415() {
    let router = build_router(test_state());
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"whatever");
    let payload = serde_json::json!({"audio": encoded, "filename": "clip.txt"});
    let request = Request::builder()
        .method("POST")
        .uri("/v1/audio/transcriptions/base64")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn unknown_model_field_is_rejected_with_400() {
    let router = build_router(test_state());
    let wav = write_wav_bytes(16_000, 0.2);
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &wav);
    let payload = serde_json::json!({"audio": encoded, "filename": "clip.wav", "model": "whisper-xxl"});
    let request = Request::builder()
        .method("POST")
        .uri("/v1/audio/transcriptions/base64")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "model_not_found");
}

/// Admission: with `maxConcurrent=1`, a second concurrent request is
/// refused with 429 inside the queue-wait budget.
#[tokio::test]
async fn second_concurrent_request_is_rate_limited() {
    let dir = tempfile::tempdir().unwrap();
    let config = EffectiveConfig { max_concurrent: 1, queue_wait_sec: 1, ..EffectiveConfig::default() };
    let state = AppState::new(config, dir.path().to_path_buf());

    let ticket = state.admission.try_enter().await.expect("first ticket should admit");

    let router = build_router(state);
    let wav = write_wav_bytes(16_000, 0.2);
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &wav);
    let payload = serde_json::json!({"audio": encoded, "filename": "clip.wav"});
    let request = Request::builder()
        .method("POST")
        .uri("/v1/audio/transcriptions/base64")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let start = std::time::Instant::now();
    let response = router.oneshot(request).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(elapsed <= std::time::Duration::from_millis(1200), "elapsed={:?}", elapsed);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "rate_limit_exceeded");
    drop(ticket);
}

/// Startup provisioning warms the shared provisioner/engine handles before
/// any request arrives, so the first transcription doesn't pay load latency.
#[tokio::test]
async fn startup_provisioning_loads_the_configured_model_eagerly() {
    let state = test_state();
    state.provision_at_startup().await.expect("startup provisioning should succeed with a seeded model");
}

/// URL fetch: a non-2xx upstream response surfaces as `url_fetch_failed`
/// with the upstream status code reflected.
#[tokio::test]
async fn url_fetch_non_2xx_is_reflected() {
    let not_found_router = axum::Router::new().fallback(|| async { StatusCode::NOT_FOUND });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, not_found_router).await.unwrap();
    });

    let router = build_router(test_state());
    let payload = serde_json::json!({"url": format!("http://{addr}/missing.wav")});
    let request = Request::builder()
        .method("POST")
        .uri("/v1/audio/transcriptions/url")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "url_fetch_failed");
}
