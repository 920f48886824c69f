//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Define the tables and indexes used by the event log.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(STREAM_ENTRY_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Event log entries, one row per appended entry.
const STREAM_ENTRY_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS stream_entry SCHEMALESS;

DEFINE FIELD IF NOT EXISTS log_key ON stream_entry TYPE string;
DEFINE FIELD IF NOT EXISTS entry_id ON stream_entry TYPE string;
DEFINE FIELD IF NOT EXISTS body ON stream_entry TYPE object;

-- Range reads and trims walk one log in entry order
DEFINE INDEX IF NOT EXISTS stream_entry_position ON stream_entry FIELDS log_key, entry_id UNIQUE;
"#;
