//! Persistence for the job queue system.
//!
//! - [`JobStore`]: job records and the pending queue, stored as documents
//!   through the `storage` crate
//! - [`EventLog`]: per-job append-only event logs, held in memory or in
//!   SurrealDB
//!
//! # Features
//!
//! - `memory` (default): Use in-memory SurrealDB for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage
//! - `surrealkv`: Use SurrealKV for persistent file-based storage

mod connection;
mod event_log;
mod job_store;
mod schema;

pub use connection::{Database, DbConfig, DbError, connect};
pub use event_log::{EventLog, LogError, LogFuture, MemoryEventLog, SurrealEventLog};
pub use job_store::{JOBS_KEY, JobStore, QUEUE_KEY, StoreError};
pub use schema::init_schema;

/// Connect to the database and define the schema.
pub async fn init(config: &DbConfig) -> Result<Database, DbError> {
    let db = connect(config).await?;
    init_schema(&db).await?;
    Ok(db)
}
