//! Core domain types for the job queue system.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobStatus and StepRecord for work items
//! - PendingQueue for the FIFO of unfinished jobs
//! - EntryId and StreamEntry for per-job event logs
//! - JobEvent for what observers receive

mod events;
mod job;
mod queue;
mod stream;

pub use events::{
    COMPLETED_MESSAGE, EventCodecError, JobEvent, STARTED_MESSAGE, replay_timeline,
};
pub use job::{Job, JobId, JobStatus, StepRecord};
pub use queue::PendingQueue;
pub use stream::{EntryFields, EntryId, StreamEntry, stream_key};
