#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use queue_core::{Job, JobEvent};
use storage::{Storage, StorageConfig};

use actors::{
    ActorRef, FnHandler, HandlerFuture, JobHandler, RelayConfig, RelayStream, SupervisorMessage,
    WorkerConfig, WorkerContext,
};
use db::{EventLog, JobStore, MemoryEventLog};

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn memory_store() -> Result<Arc<JobStore>, Box<dyn Error>> {
    let storage = Storage::new(StorageConfig::memory())?;
    Ok(Arc::new(JobStore::open(storage).await))
}

pub fn memory_log() -> Arc<dyn EventLog> {
    Arc::new(MemoryEventLog::new())
}

pub fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(10),
        error_backoff: Duration::from_millis(10),
        max_log_len: 100,
    }
}

pub fn fast_relay_config() -> RelayConfig {
    RelayConfig {
        poll_interval: Duration::from_millis(10),
        batch_size: 10,
        close_grace: Duration::from_millis(10),
        replay_settle: Duration::from_millis(20),
        replay_start_delay: Duration::from_millis(5),
        replay_pacing: Duration::from_millis(5),
    }
}

pub fn context(
    store: Arc<JobStore>,
    log: Arc<dyn EventLog>,
    handler: Arc<dyn JobHandler>,
) -> WorkerContext {
    WorkerContext {
        store,
        log,
        handler,
        config: fast_worker_config(),
    }
}

/// Handler whose step `fail_at` returns an error.
pub fn failing_handler(steps: u32, fail_at: u32) -> Arc<dyn JobHandler> {
    Arc::new(FnHandler::new(steps, move |_job: &Job, step| -> HandlerFuture {
        Box::pin(async move {
            if step == fail_at {
                Err("disk on fire".to_string())
            } else {
                Ok(format!("step {}", step))
            }
        })
    }))
}

/// Drain a relay stream until it closes.
pub async fn collect(stream: RelayStream) -> Result<Vec<JobEvent>, Box<dyn Error>> {
    Ok(tokio::time::timeout(TEST_TIMEOUT, stream.collect::<Vec<_>>()).await?)
}

/// Event kinds, in order.
pub fn kinds(events: &[JobEvent]) -> Vec<&'static str> {
    events.iter().map(JobEvent::kind).collect()
}

pub async fn open_stream(
    supervisor: &ActorRef<SupervisorMessage>,
    job: Job,
) -> Result<RelayStream, Box<dyn Error>> {
    let (tx, rx) = actors::concurrency::oneshot();
    supervisor
        .send_message(SupervisorMessage::OpenStream {
            job: Box::new(job),
            reply: tx.into(),
        })
        .map_err(|e| format!("Failed to send message: {}", e))?;
    Ok(rx.await?.map_err(|e| format!("Failed to open stream: {}", e))?)
}

pub async fn active_relays(supervisor: &ActorRef<SupervisorMessage>) -> Result<usize, Box<dyn Error>> {
    let (tx, rx) = actors::concurrency::oneshot();
    supervisor
        .send_message(SupervisorMessage::ActiveRelays { reply: tx.into() })
        .map_err(|e| format!("Failed to send message: {}", e))?;
    Ok(rx.await?)
}
