//! Job domain types for submitted work items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
///
/// Statuses only move forward: `pending -> processing -> succeeded | failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is waiting in the queue.
    #[default]
    Pending,
    /// Job has been claimed by the worker.
    Processing,
    /// Job finished and carries its output.
    Succeeded,
    /// Job's work function failed; the job carries the error message.
    Failed,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Succeeded | JobStatus::Failed => 2,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether the job still belongs in the pending queue.
    pub fn is_queued(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    /// Check whether moving to `next` keeps the lifecycle moving forward.
    ///
    /// `processing -> processing` is allowed so a restarted worker can
    /// re-claim the job it was working on.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.rank() > self.rank()
            || (*self == JobStatus::Processing && next == JobStatus::Processing)
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of completed work, as collected into a job's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// 1-based step number.
    pub step: u32,
    /// Wall-clock milliseconds since the epoch when the step finished.
    pub timestamp: i64,
    /// Milliseconds elapsed since the job started processing.
    pub processing_time: u64,
    /// Free-form description of the step's result.
    pub data: String,
}

impl StepRecord {
    /// Read a step record out of an opaque output item.
    ///
    /// Missing or mistyped fields fall back to zero or an empty string.
    pub fn from_output_item(item: &Value) -> Self {
        let number = |key: &str| item.get(key).and_then(Value::as_u64).unwrap_or(0);
        Self {
            step: u32::try_from(number("step")).unwrap_or(u32::MAX),
            timestamp: item.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
            processing_time: number("processingTime"),
            data: item
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// A job represents a unit of work submitted for background processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// When the job was created.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
    /// When the job was last updated.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated: DateTime<Utc>,
    /// Opaque input payload.
    pub data: Value,
    /// Opaque result payload, present only once the job succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Failure message, present only once the job failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(data: Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            created: now,
            updated: now,
            data,
            output: None,
            error: None,
        }
    }

    /// Milliseconds between creation and the last update.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from((self.updated - self.created).num_milliseconds()).unwrap_or(0)
    }

    /// Stored output as step records, if the output is an array.
    pub fn output_records(&self) -> Vec<StepRecord> {
        match &self.output {
            Some(Value::Array(items)) => items.iter().map(StepRecord::from_output_item).collect(),
            _ => Vec::new(),
        }
    }
}
