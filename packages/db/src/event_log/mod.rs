//! Append-only per-job event logs.
//!
//! Every job gets one log keyed by [`queue_core::stream_key`]. The worker
//! appends to it, relays read from it by cursor, and the worker trims it once
//! the job is done.

mod memory;
mod surreal;

use std::future::Future;
use std::pin::Pin;

use queue_core::{EntryFields, EntryId, StreamEntry};

pub use memory::MemoryEventLog;
pub use surreal::SurrealEventLog;

/// Errors raised by an event log backend.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("entry id generator exhausted: {0}")]
    IdExhausted(#[from] ulid::MonotonicError),

    #[error("corrupt log entry: {0}")]
    Corrupt(String),
}

/// Future returned by [`EventLog`] operations.
pub type LogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LogError>> + Send + 'a>>;

/// Storage for per-job event logs.
///
/// Implementations must hand out strictly increasing entry ids within a log
/// and never renumber entries when trimming.
pub trait EventLog: Send + Sync {
    /// Append an entry and return its id.
    fn append<'a>(&'a self, key: &'a str, fields: EntryFields) -> LogFuture<'a, EntryId>;

    /// Entries with an id greater than `from`, oldest first, at most `limit`.
    ///
    /// An unknown key reads as an empty log.
    fn read_range<'a>(
        &'a self,
        key: &'a str,
        from: EntryId,
        limit: usize,
    ) -> LogFuture<'a, Vec<StreamEntry>>;

    /// Keep only the newest `max_len` entries.
    fn trim<'a>(&'a self, key: &'a str, max_len: usize) -> LogFuture<'a, ()>;
}
