#![allow(dead_code)]

use std::error::Error;
use std::time::Duration;

use actors::{RelayConfig, WorkerConfig};
use api::{AppConfig, EventLogBackend, JobRuntime};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use storage::StorageConfig;
use tower::ServiceExt;

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// In-memory store and log with short cadences.
pub fn test_config() -> AppConfig {
    AppConfig {
        storage: StorageConfig::memory(),
        event_log: EventLogBackend::Memory,
        worker: WorkerConfig {
            poll_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(10),
            max_log_len: 100,
        },
        relay: RelayConfig {
            poll_interval: Duration::from_millis(10),
            batch_size: 10,
            close_grace: Duration::from_millis(10),
            replay_settle: Duration::from_millis(20),
            replay_start_delay: Duration::from_millis(5),
            replay_pacing: Duration::from_millis(5),
        },
        job_steps: 3,
        job_step: Duration::from_millis(5),
        ..AppConfig::default()
    }
}

pub async fn start_app() -> Result<(Router, JobRuntime), Box<dyn Error>> {
    let runtime = api::start(&test_config()).await?;
    Ok((api::app(runtime.service()), runtime))
}

pub async fn get(app: &Router, uri: &str) -> Result<(StatusCode, Vec<u8>), Box<dyn Error>> {
    let request = Request::builder().uri(uri).body(Body::empty())?;
    send(app, request).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: &str,
) -> Result<(StatusCode, Vec<u8>), Box<dyn Error>> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?;
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Vec<u8>), Box<dyn Error>> {
    let response = tokio::time::timeout(TEST_TIMEOUT, app.clone().oneshot(request)).await??;
    let status = response.status();
    let body = tokio::time::timeout(
        TEST_TIMEOUT,
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await??;
    Ok((status, body.to_vec()))
}

pub fn json(body: &[u8]) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::from_slice(body)?)
}

/// JSON payloads of the `data:` lines in an SSE body.
pub fn sse_events(body: &[u8]) -> Result<Vec<Value>, Box<dyn Error>> {
    let text = std::str::from_utf8(body)?;
    let mut events = Vec::new();
    for line in text.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            events.push(serde_json::from_str(data.trim_start())?);
        }
    }
    Ok(events)
}

pub fn event_types(events: &[Value]) -> Vec<&str> {
    events
        .iter()
        .map(|e| e["type"].as_str().unwrap_or("?"))
        .collect()
}
