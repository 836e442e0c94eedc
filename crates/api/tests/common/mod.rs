#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::Duration;
use http_body_util::BodyExt;
use tower::ServiceExt;

use marquee_api::config::{ServerConfig, StoreKind};
use marquee_api::router::build_app_router;
use marquee_api::state::AppState;
use marquee_db::memory::MemoryStore;
use marquee_pipeline::config::GenerationConfig;
use marquee_pipeline::encode::{ArtifactEncoder, EncodeError};
use marquee_pipeline::now_playing::DEFAULT_PLAYER_URL;
use marquee_pipeline::render::Frame;

/// Build a test `ServerConfig` backed by the in-memory store.
///
/// Render and static directories live under `dir` so tests never share files.
pub fn test_config(dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        store: StoreKind::Memory,
        database_url: None,
        static_dir: dir.join("static"),
        generation: GenerationConfig {
            render_dir: dir.join("render"),
            ..GenerationConfig::default()
        },
        generate_interval_secs: None,
        retention_hours: 4,
        now_playing_token: None,
        now_playing_url: DEFAULT_PLAYER_URL.to_string(),
    }
}

/// Writes an empty artifact instead of shelling out to `webpmux`.
pub struct StubEncoder;

impl ArtifactEncoder for StubEncoder {
    fn encode(&self, _: &[Frame], _: Duration, dest: &Path) -> Result<(), EncodeError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, b"")?;
        Ok(())
    }
}

/// Build the full application router over `store`, using the same middleware
/// stack as `main.rs`.
pub fn build_test_app(store: Arc<MemoryStore>, dir: &Path) -> Router {
    let config = test_config(dir);
    let state = AppState::new(store, config.clone(), Arc::new(StubEncoder), None);
    build_app_router(state, &config)
}

pub async fn send(app: Router, method: Method, uri: &str, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, Body::empty()).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(json.to_string())).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Body::empty()).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
