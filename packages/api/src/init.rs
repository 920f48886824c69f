//! Startup and shutdown of the job queue runtime.

use std::sync::Arc;
use std::time::Duration;

use actors::{ActorRef, JobHandler, SimulatedHandler, SupervisorArgs, SupervisorMessage, start_supervisor};
use db::{DbError, EventLog, JobStore, MemoryEventLog, SurrealEventLog};
use storage::{Storage, StorageError};
use tokio::task::JoinHandle;

use crate::config::{AppConfig, EventLogBackend};
use crate::service::JobService;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("failed to start supervisor: {0}")]
    Spawn(#[from] ractor::SpawnErr),
}

/// A running job queue: the store, its worker and the relay supervisor.
pub struct JobRuntime {
    service: JobService,
    supervisor: ActorRef<SupervisorMessage>,
    handle: JoinHandle<()>,
}

/// Open the job store and event log and start the supervisor with the
/// simulated handler.
pub async fn start(config: &AppConfig) -> Result<JobRuntime, InitError> {
    let handler = Arc::new(SimulatedHandler::new(config.job_steps, config.job_step));
    start_with_handler(config, handler).await
}

/// Like [`start`], with a caller-supplied work function.
pub async fn start_with_handler(
    config: &AppConfig,
    handler: Arc<dyn JobHandler>,
) -> Result<JobRuntime, InitError> {
    tracing::info!("Initializing job queue system...");

    let storage = Storage::new(config.storage.clone())?;
    tracing::info!("Job store backend: {}", storage.kind_str());
    let store = Arc::new(JobStore::open(storage).await);

    let log: Arc<dyn EventLog> = match config.event_log {
        EventLogBackend::Memory => Arc::new(MemoryEventLog::new()),
        EventLogBackend::Surreal => {
            let db = db::init(&config.db).await?;
            Arc::new(SurrealEventLog::new(db))
        }
    };
    tracing::info!("Event log backend: {:?}", config.event_log);

    let (supervisor, handle) = start_supervisor(SupervisorArgs {
        store: store.clone(),
        log,
        handler,
        worker: config.worker.clone(),
        relay: config.relay.clone(),
    })
    .await?;

    tracing::info!("Job queue system initialized");
    Ok(JobRuntime {
        service: JobService::new(store, supervisor.clone()),
        supervisor,
        handle,
    })
}

impl JobRuntime {
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn service(&self) -> JobService {
        self.service.clone()
    }

    /// Stop relays and the worker, waiting up to `timeout` for the
    /// supervisor to exit before killing it.
    pub async fn shutdown(self, timeout: Duration) {
        tracing::info!("Stopping job queue supervisor");
        if let Err(e) = self.supervisor.send_message(SupervisorMessage::Shutdown) {
            tracing::warn!("Supervisor already stopped: {}", e);
        }

        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => tracing::info!("Job queue supervisor stopped"),
            Ok(Err(e)) => tracing::error!("Supervisor task failed: {}", e),
            Err(_) => {
                tracing::warn!("Supervisor did not stop within {:?}, killing it", timeout);
                self.supervisor.kill();
            }
        }
    }
}
