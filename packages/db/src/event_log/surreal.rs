use queue_core::{EntryFields, EntryId, StreamEntry};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use ulid::Generator;

use super::{EventLog, LogError, LogFuture};
use crate::Database;

/// Event logs stored as rows of the `stream_entry` table.
///
/// Requires [`crate::init_schema`] to have run on the database.
pub struct SurrealEventLog {
    db: Database,
    ids: Mutex<Generator>,
}

/// Row written to the `stream_entry` table.
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    log_key: String,
    entry_id: String,
    body: EntryFields,
}

#[derive(Debug, Deserialize)]
struct EntryRow {
    entry_id: String,
    body: EntryFields,
}

impl SurrealEventLog {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            ids: Mutex::new(Generator::new()),
        }
    }
}

impl EventLog for SurrealEventLog {
    fn append<'a>(&'a self, key: &'a str, fields: EntryFields) -> LogFuture<'a, EntryId> {
        Box::pin(async move {
            let id = EntryId(self.ids.lock().await.generate()?);
            let record = EntryRecord {
                log_key: key.to_string(),
                entry_id: id.to_string(),
                body: fields,
            };

            self.db
                .query("CREATE stream_entry CONTENT $record")
                .bind(("record", record))
                .await?
                .check()?;

            Ok(id)
        })
    }

    fn read_range<'a>(
        &'a self,
        key: &'a str,
        from: EntryId,
        limit: usize,
    ) -> LogFuture<'a, Vec<StreamEntry>> {
        Box::pin(async move {
            let mut response = self
                .db
                .query(
                    r#"
                    SELECT entry_id, body FROM stream_entry
                    WHERE log_key = $key AND entry_id > $from
                    ORDER BY entry_id ASC
                    LIMIT $limit
                    "#,
                )
                .bind(("key", key.to_string()))
                .bind(("from", from.to_string()))
                .bind(("limit", limit as i64))
                .await?;

            let rows: Vec<EntryRow> = response.take(0)?;

            rows.into_iter()
                .map(|row| {
                    let id = row
                        .entry_id
                        .parse::<EntryId>()
                        .map_err(|e| LogError::Corrupt(format!("{}: {}", row.entry_id, e)))?;
                    Ok(StreamEntry {
                        id,
                        fields: row.body,
                    })
                })
                .collect()
        })
    }

    fn trim<'a>(&'a self, key: &'a str, max_len: usize) -> LogFuture<'a, ()> {
        Box::pin(async move {
            // Newest entry that falls outside the window; it and everything
            // older is removed.
            let query = format!(
                "SELECT entry_id FROM stream_entry WHERE log_key = $key ORDER BY entry_id DESC LIMIT 1 START {}",
                max_len
            );
            let mut response = self.db.query(query).bind(("key", key.to_string())).await?;
            let cutoff: Option<String> = response.take((0, "entry_id"))?;

            let Some(cutoff) = cutoff else {
                return Ok(());
            };

            self.db
                .query("DELETE stream_entry WHERE log_key = $key AND entry_id <= $cutoff")
                .bind(("key", key.to_string()))
                .bind(("cutoff", cutoff))
                .await?
                .check()?;

            tracing::debug!("Trimmed log {} to {} entries", key, max_len);
            Ok(())
        })
    }
}
