//! Worker actor that drains the pending queue one job at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use db::{EventLog, JobStore, LogError, StoreError};
use queue_core::{
    COMPLETED_MESSAGE, EventCodecError, Job, JobEvent, JobId, JobStatus, STARTED_MESSAGE,
    StepRecord, stream_key,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio_util::sync::CancellationToken;

use crate::handler::JobHandler;
use crate::messages::WorkerMessage;

/// Worker cadences and limits.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Wait before polling again when the queue is empty.
    pub poll_interval: Duration,
    /// Wait before polling again after a failed iteration.
    pub error_backoff: Duration,
    /// Entries kept in a job's log once it is done.
    pub max_log_len: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
            max_log_len: 100,
        }
    }
}

/// Errors from one worker iteration.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Event log error: {0}")]
    Log(#[from] LogError),

    #[error("Event encoding error: {0}")]
    Codec(#[from] EventCodecError),

    #[error("Output encoding error: {0}")]
    Output(#[from] serde_json::Error),

    /// The handler failed a step.
    #[error("{0}")]
    Handler(String),

    #[error("Worker is shutting down")]
    Interrupted,
}

/// What happened to the job taken from the queue head.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded(Job),
    Failed(Job),
    /// Shutdown arrived mid-job; the job stays at the head to be re-claimed.
    Interrupted(JobId),
    /// The head was already finished and was only dequeued.
    Stale(JobId),
}

/// Everything one worker iteration needs.
#[derive(Clone)]
pub struct WorkerContext {
    pub store: Arc<JobStore>,
    pub log: Arc<dyn EventLog>,
    pub handler: Arc<dyn JobHandler>,
    pub config: WorkerConfig,
}

impl WorkerContext {
    /// Process the job at the head of the queue, if any.
    ///
    /// Handler and log failures fail the job and still dequeue it; only store
    /// failures are returned as errors.
    pub async fn process_next(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<Option<JobOutcome>, WorkerError> {
        let Some(head) = self.store.peek_next_job().await else {
            return Ok(None);
        };

        if head.status.is_terminal() {
            tracing::warn!("Dequeuing job {} already {}", head.id, head.status);
            self.store.remove_from_queue(head.id).await?;
            return Ok(Some(JobOutcome::Stale(head.id)));
        }

        if head.status == JobStatus::Processing {
            tracing::warn!("Re-claiming job {} left in processing", head.id);
        }
        let job = self
            .store
            .update_status(head.id, JobStatus::Processing, None)
            .await?;
        tracing::info!("Processing job {}", job.id);

        let outcome = match self.run_job(&job, shutdown).await {
            Ok(records) => {
                let output = serde_json::to_value(&records)?;
                let done = self
                    .store
                    .update_status(job.id, JobStatus::Succeeded, Some(output))
                    .await?;
                tracing::info!("Job {} completed in {}ms", job.id, done.elapsed_ms());
                JobOutcome::Succeeded(done)
            }
            Err(WorkerError::Interrupted) => {
                tracing::info!("Job {} interrupted by shutdown", job.id);
                return Ok(Some(JobOutcome::Interrupted(job.id)));
            }
            Err(e) => {
                tracing::error!("Job {} failed: {}", job.id, e);
                self.record_failure(&job, &e.to_string()).await;
                let failed = self.store.fail_job(job.id, e.to_string()).await?;
                JobOutcome::Failed(failed)
            }
        };

        self.store.remove_from_queue(job.id).await?;
        Ok(Some(outcome))
    }

    /// Run every step, logging `started`, one `progress` per step and
    /// `completed`, then trim the log.
    async fn run_job(
        &self,
        job: &Job,
        shutdown: &CancellationToken,
    ) -> Result<Vec<StepRecord>, WorkerError> {
        let key = stream_key(job.id);
        let began = Instant::now();

        self.append(
            &key,
            &JobEvent::Started {
                job_id: job.id,
                timestamp: now_ms(),
                message: STARTED_MESSAGE.to_string(),
            },
        )
        .await?;

        let total = self.handler.total_steps(job);
        let mut records = Vec::with_capacity(total as usize);

        for step in 1..=total {
            if shutdown.is_cancelled() {
                return Err(WorkerError::Interrupted);
            }

            let data = self
                .handler
                .run_step(job, step)
                .await
                .map_err(WorkerError::Handler)?;

            let record = StepRecord {
                step,
                timestamp: now_ms(),
                processing_time: elapsed_ms(began),
                data,
            };
            self.append(&key, &JobEvent::progress(job.id, &record)).await?;
            records.push(record);
        }

        self.append(
            &key,
            &JobEvent::Completed {
                job_id: job.id,
                timestamp: now_ms(),
                processing_time: elapsed_ms(began),
                message: COMPLETED_MESSAGE.to_string(),
            },
        )
        .await?;

        self.log.trim(&key, self.config.max_log_len).await?;
        Ok(records)
    }

    /// Log the `error` event for a failed job. Failures here are only logged.
    async fn record_failure(&self, job: &Job, error: &str) {
        let key = stream_key(job.id);
        let event = JobEvent::Error {
            job_id: job.id,
            timestamp: now_ms(),
            error: error.to_string(),
        };

        if let Err(e) = self.append(&key, &event).await {
            tracing::warn!("Could not log error event for job {}: {}", job.id, e);
        }
        if let Err(e) = self.log.trim(&key, self.config.max_log_len).await {
            tracing::warn!("Could not trim log for job {}: {}", job.id, e);
        }
    }

    async fn append(&self, key: &str, event: &JobEvent) -> Result<(), WorkerError> {
        self.log.append(key, event.to_fields()?).await?;
        Ok(())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// State for the worker actor.
pub struct WorkerActorState {
    ctx: WorkerContext,
    shutdown: CancellationToken,
    /// Jobs taken off the queue by this worker.
    processed: u64,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub ctx: WorkerContext,
    /// Cancelled when the worker should stop after its current step.
    pub shutdown: CancellationToken,
}

/// Worker actor that executes jobs.
pub struct WorkerActor;

impl WorkerActor {
    fn schedule_poll(myself: &ActorRef<WorkerMessage>, delay: Duration) {
        if delay.is_zero() {
            let _ = myself.send_message(WorkerMessage::Poll);
            return;
        }

        let myself = myself.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = myself.send_message(WorkerMessage::Poll);
        });
    }
}

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker");

        myself.send_message(WorkerMessage::Poll)?;

        Ok(WorkerActorState {
            ctx: args.ctx,
            shutdown: args.shutdown,
            processed: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                if state.shutdown.is_cancelled() {
                    return Ok(());
                }

                let delay = match state.ctx.process_next(&state.shutdown).await {
                    Ok(Some(JobOutcome::Interrupted(_))) => return Ok(()),
                    Ok(Some(_)) => {
                        state.processed += 1;
                        Duration::ZERO
                    }
                    Ok(None) => state.ctx.config.poll_interval,
                    Err(e) => {
                        tracing::error!("Worker iteration failed: {}", e);
                        state.ctx.config.error_backoff
                    }
                };

                Self::schedule_poll(&myself, delay);
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker after {} jobs", state.processed);
                myself.stop(None);
            }
        }

        Ok(())
    }
}
