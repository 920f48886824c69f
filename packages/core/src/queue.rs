//! Pending queue of job ids awaiting the worker.

use serde::{Deserialize, Serialize};

use crate::JobId;

/// FIFO list of job ids that still need processing.
///
/// An id stays at the head while its job is being worked on and is removed
/// only once the worker is done with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQueue {
    #[serde(default)]
    jobs: Vec<JobId>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an id to the tail. Returns false if the id is already queued.
    pub fn push(&mut self, id: JobId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.jobs.push(id);
        true
    }

    /// The oldest queued id.
    pub fn head(&self) -> Option<JobId> {
        self.jobs.first().copied()
    }

    /// Remove an id wherever it sits. Returns true if it was present.
    pub fn remove(&mut self, id: JobId) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|queued| *queued != id);
        self.jobs.len() != before
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Queued ids in FIFO order.
    pub fn ids(&self) -> &[JobId] {
        &self.jobs
    }

    /// Keep only the ids accepted by `keep`, dropping duplicates.
    ///
    /// Returns the ids that were dropped.
    pub fn retain_valid(&mut self, mut keep: impl FnMut(JobId) -> bool) -> Vec<JobId> {
        let mut seen = std::collections::HashSet::new();
        let mut dropped = Vec::new();
        self.jobs.retain(|id| {
            let ok = seen.insert(*id) && keep(*id);
            if !ok {
                dropped.push(*id);
            }
            ok
        });
        dropped
    }
}
