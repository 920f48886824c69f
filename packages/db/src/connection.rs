//! SurrealDB connection setup.

use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect as connect_any};
use surrealdb::opt::auth::Root;
use thiserror::Error;

/// Database connection handle.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Engine endpoint: `mem://`, `surrealkv://path` or `rocksdb://path`.
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "jobs".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set root credentials for authentication.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Read `SURREAL_ENDPOINT`, `SURREAL_NAMESPACE`, `SURREAL_DATABASE`,
    /// `SURREAL_USER` and `SURREAL_PASS`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().and_then(non_empty);

        let config = Self {
            endpoint: var("SURREAL_ENDPOINT").unwrap_or(defaults.endpoint),
            namespace: var("SURREAL_NAMESPACE").unwrap_or(defaults.namespace),
            database: var("SURREAL_DATABASE").unwrap_or(defaults.database),
            credentials: None,
        };

        match (var("SURREAL_USER"), var("SURREAL_PASS")) {
            (Some(user), Some(pass)) => config.with_credentials(user, pass),
            _ => config,
        }
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
}

/// Open a connection and select the configured namespace and database.
pub async fn connect(config: &DbConfig) -> Result<Database, DbError> {
    tracing::info!("Connecting to database: {}", config.endpoint);

    let db = connect_any(&config.endpoint).await?;

    if let Some((username, password)) = &config.credentials {
        db.signin(Root {
            username,
            password,
        })
        .await?;
    }

    db.use_ns(&config.namespace).use_db(&config.database).await?;

    tracing::info!(
        "Connected to database: {}/{}",
        config.namespace,
        config.database
    );

    Ok(db)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
