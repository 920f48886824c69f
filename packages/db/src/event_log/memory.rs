use std::collections::HashMap;

use queue_core::{EntryFields, EntryId, StreamEntry};
use tokio::sync::Mutex;
use ulid::Generator;

use super::{EventLog, LogFuture};

/// Event logs held in process memory.
pub struct MemoryEventLog {
    inner: Mutex<MemoryState>,
}

struct MemoryState {
    streams: HashMap<String, Vec<StreamEntry>>,
    ids: Generator,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                streams: HashMap::new(),
                ids: Generator::new(),
            }),
        }
    }
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog for MemoryEventLog {
    fn append<'a>(&'a self, key: &'a str, fields: EntryFields) -> LogFuture<'a, EntryId> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            let id = EntryId(state.ids.generate()?);
            state
                .streams
                .entry(key.to_string())
                .or_default()
                .push(StreamEntry { id, fields });
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
            let state = self.inner.lock().await;
            let Some(entries) = state.streams.get(key) else {
                return Ok(Vec::new());
            };
            let start = entries.partition_point(|entry| entry.id <= from);
            Ok(entries[start..].iter().take(limit).cloned().collect())
        })
    }

    fn trim<'a>(&'a self, key: &'a str, max_len: usize) -> LogFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            if let Some(entries) = state.streams.get_mut(key) {
                let excess = entries.len().saturating_sub(max_len);
                entries.drain(..excess);
            }
            Ok(())
        })
    }
}
