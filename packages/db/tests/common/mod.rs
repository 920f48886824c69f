#![allow(dead_code)]

use std::path::Path;

use serde_json::{Map, Value};
use storage::{Storage, StorageConfig, StorageError};

use db::{DbConfig, DbError, JobStore, SurrealEventLog};

pub fn payload_with_message(message: &str) -> Value {
    let mut map = Map::new();
    map.insert("msg".to_string(), Value::String(message.to_string()));
    Value::Object(map)
}

pub fn memory_storage() -> Result<Storage, StorageError> {
    Storage::new(StorageConfig::memory())
}

pub fn fs_storage(root: &Path) -> Result<Storage, StorageError> {
    Storage::new(StorageConfig::filesystem(root))
}

pub async fn memory_store() -> Result<JobStore, StorageError> {
    Ok(JobStore::open(memory_storage()?).await)
}

/// A SurrealDB event log on its own in-memory database.
pub async fn surreal_log() -> Result<SurrealEventLog, DbError> {
    let db = db::init(&DbConfig::memory()).await?;
    Ok(SurrealEventLog::new(db))
}
