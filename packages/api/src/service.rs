//! Job operations behind the HTTP routes.

use std::sync::Arc;

use actors::{ActorRef, RelayStream, SupervisorMessage};
use db::JobStore;
use queue_core::{Job, JobId};
use serde_json::Value;

use crate::error::ApiError;

/// Handle shared by every request.
#[derive(Clone)]
pub struct JobService {
    store: Arc<JobStore>,
    supervisor: ActorRef<SupervisorMessage>,
}

impl JobService {
    pub fn new(store: Arc<JobStore>, supervisor: ActorRef<SupervisorMessage>) -> Self {
        Self { store, supervisor }
    }

    /// Submit a new job. Missing or empty `data` is rejected.
    pub async fn create_job(&self, data: Option<Value>) -> Result<Job, ApiError> {
        let data = match data {
            Some(data) if !is_empty_data(&data) => data,
            _ => return Err(ApiError::missing_data()),
        };

        let job = self.store.create_job(data).await?;
        tracing::info!("Job {} queued", job.id);
        Ok(job)
    }

    /// Current snapshot of a job. Unparseable ids are reported as not found.
    pub async fn get_job(&self, id: &str) -> Result<Job, ApiError> {
        let id = JobId::parse(id).map_err(|_| ApiError::job_not_found())?;
        self.store.get_job(id).await.ok_or_else(ApiError::job_not_found)
    }

    /// Open a live event stream for a job.
    ///
    /// The job is looked up first, so an unknown id fails before any event
    /// is produced.
    pub async fn stream_job(&self, id: &str) -> Result<RelayStream, ApiError> {
        let job = self.get_job(id).await?;

        let (tx, rx) = actors::concurrency::oneshot();
        self.supervisor
            .send_message(SupervisorMessage::OpenStream {
                job: Box::new(job),
                reply: tx.into(),
            })
            .map_err(|e| ApiError::Unavailable(format!("supervisor not running: {}", e)))?;

        match rx.await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ApiError::Unavailable(e)),
            Err(_) => Err(ApiError::Unavailable("supervisor dropped the request".to_string())),
        }
    }
}

/// `null`, `""`, `{}` and `[]` count as no data.
///
/// This is an emptiness check, not a truthiness check: `0` and `false` are
/// accepted as data, while empty objects and arrays are not.
pub fn is_empty_data(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
