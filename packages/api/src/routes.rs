//! HTTP routes.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures_util::{Stream, StreamExt};
use queue_core::Job;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiError;
use crate::service::JobService;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub data: Option<Value>,
}

/// Job routes without middleware.
pub fn router(service: JobService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/job", post(create_job))
        .route("/job/{id}", get(get_job))
        .route("/job/{id}/stream", get(stream_job))
        .with_state(service)
}

/// The full application: routes plus CORS and request tracing.
pub fn app(service: JobService) -> Router {
    router(service)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /job
async fn create_job(
    State(service): State<JobService>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // A body that is not a JSON object carries no data either.
    let data = payload.ok().and_then(|Json(req)| req.data);
    let job = service.create_job(data).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /job/{id}
async fn get_job(
    State(service): State<JobService>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    service.get_job(&id).await.map(Json)
}

/// GET /job/{id}/stream
async fn stream_job(
    State(service): State<JobService>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let stream = service.stream_job(&id).await?;
    tracing::debug!("Streaming events for job {}", stream.job_id());

    let events = stream.map(|event| Event::default().json_data(&event));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
