//! Event types delivered to observers of a job.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EntryFields, Job, JobId, JobStatus, StepRecord};

pub const STARTED_MESSAGE: &str = "Job processing started";
pub const COMPLETED_MESSAGE: &str = "Job processing completed";

/// Errors converting between events and flat log fields.
#[derive(Debug, thiserror::Error)]
pub enum EventCodecError {
    #[error("event JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field {0} is not a plain string")]
    NotFlat(String),
}

/// Serialize numbers as strings, matching the log's text-only fields.
mod as_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Events emitted while a job is processed, plus the `initial` snapshot
/// every observer receives first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum JobEvent {
    /// Snapshot of the job at the moment an observer attached.
    Initial {
        job_id: JobId,
        #[serde(with = "as_string")]
        timestamp: i64,
        job: Box<Job>,
    },
    /// The worker picked the job up.
    Started {
        job_id: JobId,
        #[serde(with = "as_string")]
        timestamp: i64,
        message: String,
    },
    /// One unit of work finished.
    Progress {
        job_id: JobId,
        #[serde(with = "as_string")]
        step: u32,
        #[serde(with = "as_string")]
        timestamp: i64,
        #[serde(with = "as_string")]
        processing_time: u64,
        data: String,
    },
    /// All work finished.
    Completed {
        job_id: JobId,
        #[serde(with = "as_string")]
        timestamp: i64,
        #[serde(with = "as_string")]
        processing_time: u64,
        message: String,
    },
    /// The work function failed.
    Error {
        job_id: JobId,
        #[serde(with = "as_string")]
        timestamp: i64,
        error: String,
    },
}

impl JobEvent {
    pub fn initial(job: &Job) -> Self {
        JobEvent::Initial {
            job_id: job.id,
            timestamp: chrono::Utc::now().timestamp_millis(),
            job: Box::new(job.clone()),
        }
    }

    pub fn progress(job_id: JobId, record: &StepRecord) -> Self {
        JobEvent::Progress {
            job_id,
            step: record.step,
            timestamp: record.timestamp,
            processing_time: record.processing_time,
            data: record.data.clone(),
        }
    }

    /// The `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            JobEvent::Initial { .. } => "initial",
            JobEvent::Started { .. } => "started",
            JobEvent::Progress { .. } => "progress",
            JobEvent::Completed { .. } => "completed",
            JobEvent::Error { .. } => "error",
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Initial { job_id, .. }
            | JobEvent::Started { job_id, .. }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Error { job_id, .. } => *job_id,
        }
    }

    /// Whether this event ends the job's event sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Completed { .. } | JobEvent::Error { .. })
    }

    /// Flatten the event into string fields for the event log.
    ///
    /// `initial` carries a nested job snapshot and cannot be stored.
    pub fn to_fields(&self) -> Result<EntryFields, EventCodecError> {
        let Value::Object(map) = serde_json::to_value(self)? else {
            return Err(EventCodecError::NotFlat("type".into()));
        };
        map.into_iter()
            .map(|(key, value)| match value {
                Value::String(text) => Ok((key, text)),
                _ => Err(EventCodecError::NotFlat(key)),
            })
            .collect()
    }

    /// Rebuild an event from stored log fields.
    pub fn from_fields(fields: &EntryFields) -> Result<Self, EventCodecError> {
        let map: Map<String, Value> = fields
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        Ok(serde_json::from_value(Value::Object(map))?)
    }
}

/// Synthesize the event sequence of a job that already reached a terminal
/// state, for observers that attach after its log is gone.
///
/// Succeeded jobs replay `started`, one `progress` per stored output record,
/// then `completed`. Failed jobs replay `started` then `error`. Anything else
/// has no timeline to replay.
pub fn replay_timeline(job: &Job) -> Option<Vec<JobEvent>> {
    let started = JobEvent::Started {
        job_id: job.id,
        timestamp: job.created.timestamp_millis(),
        message: STARTED_MESSAGE.to_string(),
    };

    match job.status {
        JobStatus::Succeeded if job.output.is_some() => {
            let mut events = vec![started];
            events.extend(
                job.output_records()
                    .iter()
                    .map(|record| JobEvent::progress(job.id, record)),
            );
            events.push(JobEvent::Completed {
                job_id: job.id,
                timestamp: job.updated.timestamp_millis(),
                processing_time: job.elapsed_ms(),
                message: COMPLETED_MESSAGE.to_string(),
            });
            Some(events)
        }
        JobStatus::Failed => Some(vec![
            started,
            JobEvent::Error {
                job_id: job.id,
                timestamp: job.updated.timestamp_millis(),
                error: job.error.clone().unwrap_or_default(),
            },
        ]),
        _ => None,
    }
}
