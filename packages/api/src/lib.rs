//! HTTP API for the job queue.
//!
//! - `POST /job` submits a job
//! - `GET /job/{id}` returns its current state
//! - `GET /job/{id}/stream` streams its events over SSE

mod config;
mod error;
mod init;
mod routes;
mod service;

pub use config::{AppConfig, ConfigError, EventLogBackend};
pub use error::{ApiError, ErrorResponse};
pub use init::{InitError, JobRuntime, start, start_with_handler};
pub use routes::{CreateJobRequest, app, router};
pub use service::{JobService, is_empty_data};

// Re-export core types for convenience
pub use queue_core::{Job, JobEvent, JobId, JobStatus};
