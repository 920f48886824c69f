//! Event log entry types.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::JobId;

/// Flat string fields stored in one log entry.
pub type EntryFields = BTreeMap<String, String>;

/// Identifier of an entry within one job's event log.
///
/// Ids are strictly increasing within a log, and their string form sorts the
/// same way, so range reads can compare either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub Ulid);

impl EntryId {
    /// Position before the first entry of any log.
    pub const ZERO: EntryId = EntryId(Ulid(0));
}

impl Default for EntryId {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "0" {
            return Ok(Self::ZERO);
        }
        Ok(Self(Ulid::from_string(s)?))
    }
}

/// One appended record in an event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub id: EntryId,
    pub fields: EntryFields,
}

impl StreamEntry {
    /// The entry's `type` field, if present.
    pub fn event_type(&self) -> Option<&str> {
        self.fields.get("type").map(String::as_str)
    }

    /// Whether this entry ends a job's event sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self.event_type(), Some("completed" | "error"))
    }
}

/// Log key for a job's event stream.
pub fn stream_key(job_id: JobId) -> String {
    format!("job:{}:stream", job_id)
}
