//! Job table and pending queue, persisted as whole documents.

use std::collections::HashMap;

use chrono::Utc;
use queue_core::{Job, JobId, JobStatus, PendingQueue};
use serde_json::Value;
use storage::{Storage, StorageError};
use tokio::sync::Mutex;

/// Object key holding every job, as a JSON array.
pub const JOBS_KEY: &str = "jobs.json";
/// Object key holding the pending queue, as `{"jobs": [ids]}`.
pub const QUEUE_KEY: &str = "queue.json";

/// Job store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {0} cannot succeed without output")]
    MissingOutput(JobId),

    #[error("Job {0} can only carry output once it succeeded")]
    UnexpectedOutput(JobId),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default)]
struct StoreState {
    jobs: HashMap<JobId, Job>,
    queue: PendingQueue,
}

/// Owner of all job records and the pending queue.
///
/// Every mutation holds one lock across its writes, so the two documents are
/// never written concurrently. A mutation that fails to persist is undone in
/// memory and its error returned.
pub struct JobStore {
    storage: Storage,
    state: Mutex<StoreState>,
}

impl JobStore {
    /// Load the store from `storage`.
    ///
    /// A missing or unreadable document starts that part empty. Queue ids
    /// that are duplicated, unknown, or already finished are dropped.
    pub async fn open(storage: Storage) -> Self {
        let jobs: Vec<Job> = load_or_empty(&storage, JOBS_KEY).await;
        let mut queue: PendingQueue = load_or_empty(&storage, QUEUE_KEY).await;

        let jobs: HashMap<JobId, Job> = jobs.into_iter().map(|job| (job.id, job)).collect();
        let dropped = queue.retain_valid(|id| jobs.get(&id).is_some_and(|job| job.status.is_queued()));

        let store = Self {
            storage,
            state: Mutex::new(StoreState { jobs, queue }),
        };

        if !dropped.is_empty() {
            tracing::warn!("Dropped {} stale queue entries: {:?}", dropped.len(), dropped);
            let state = store.state.lock().await;
            if let Err(e) = store.persist_queue(&state).await {
                tracing::warn!("Failed to persist reconciled queue: {}", e);
            }
        }

        {
            let state = store.state.lock().await;
            tracing::info!(
                "Job store loaded from {} backend: {} jobs, {} queued",
                store.storage.kind_str(),
                state.jobs.len(),
                state.queue.len()
            );
        }

        store
    }

    /// Create a pending job and append it to the queue.
    pub async fn create_job(&self, data: Value) -> Result<Job, StoreError> {
        let job = Job::new(data);
        let mut state = self.state.lock().await;

        state.jobs.insert(job.id, job.clone());
        state.queue.push(job.id);

        let persisted = match self.persist_jobs(&state).await {
            Ok(()) => self.persist_queue(&state).await,
            Err(e) => Err(e),
        };

        if let Err(e) = persisted {
            state.jobs.remove(&job.id);
            state.queue.remove(job.id);
            if let Err(restore) = self.persist_all(&state).await {
                tracing::warn!("Failed to restore store after aborted create: {}", restore);
            }
            return Err(e);
        }

        tracing::debug!("Created job {}", job.id);
        Ok(job)
    }

    pub async fn get_job(&self, id: JobId) -> Option<Job> {
        self.state.lock().await.jobs.get(&id).cloned()
    }

    /// The job at the head of the queue, left in place.
    pub async fn peek_next_job(&self) -> Option<Job> {
        let state = self.state.lock().await;
        state.queue.head().and_then(|id| state.jobs.get(&id).cloned())
    }

    /// Move a job to `status`, storing `output` when it succeeds.
    ///
    /// `output` must be given exactly when `status` is succeeded.
    pub async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        output: Option<Value>,
    ) -> Result<Job, StoreError> {
        match (status, output.is_some()) {
            (JobStatus::Succeeded, false) => return Err(StoreError::MissingOutput(id)),
            (JobStatus::Succeeded, true) | (_, false) => {}
            (_, true) => return Err(StoreError::UnexpectedOutput(id)),
        }

        self.transition(id, status, |job| {
            job.output = output;
        })
        .await
    }

    /// Mark a job failed with an error message.
    pub async fn fail_job(&self, id: JobId, error: impl Into<String>) -> Result<Job, StoreError> {
        let error = error.into();
        self.transition(id, JobStatus::Failed, |job| {
            job.error = Some(error);
        })
        .await
    }

    /// Remove a job id from the queue. Returns false if it was not queued.
    pub async fn remove_from_queue(&self, id: JobId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let previous = state.queue.clone();

        if !state.queue.remove(id) {
            return Ok(false);
        }

        if let Err(e) = self.persist_queue(&state).await {
            state.queue = previous;
            return Err(e);
        }

        tracing::debug!("Removed job {} from queue", id);
        Ok(true)
    }

    /// All jobs still waiting for the worker, oldest first.
    pub async fn list_pending(&self) -> Vec<Job> {
        let state = self.state.lock().await;
        let mut pending: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|job| job.id);
        pending
    }

    /// Number of queued job ids.
    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    async fn transition(
        &self,
        id: JobId,
        status: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job, StoreError> {
        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if !job.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id,
                from: job.status,
                to: status,
            });
        }

        let previous = job.clone();
        job.status = status;
        job.updated = Utc::now().max(job.created);
        apply(job);
        let updated = job.clone();

        if let Err(e) = self.persist_jobs(&state).await {
            state.jobs.insert(id, previous);
            return Err(e);
        }

        tracing::debug!("Job {} is now {}", id, status);
        Ok(updated)
    }

    async fn persist_jobs(&self, state: &StoreState) -> Result<(), StoreError> {
        let mut jobs: Vec<&Job> = state.jobs.values().collect();
        jobs.sort_by_key(|job| job.id);
        self.storage.put_json(JOBS_KEY, &jobs).await?;
        Ok(())
    }

    async fn persist_queue(&self, state: &StoreState) -> Result<(), StoreError> {
        self.storage.put_json(QUEUE_KEY, &state.queue).await?;
        Ok(())
    }

    async fn persist_all(&self, state: &StoreState) -> Result<(), StoreError> {
        self.persist_jobs(state).await?;
        self.persist_queue(state).await
    }
}

async fn load_or_empty<T>(storage: &Storage, key: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match storage.get_json(key).await {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!("Could not load {}, starting empty: {}", key, e);
            T::default()
        }
    }
}
