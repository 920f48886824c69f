//! Runtime configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use actors::{RelayConfig, SimulatedHandler, WorkerConfig};
use db::DbConfig;
use storage::{StorageConfig, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}={value}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("storage config: {0}")]
    Storage(#[from] StorageError),
}

/// Where job event logs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLogBackend {
    Memory,
    Surreal,
}

impl FromStr for EventLogBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" | "mem" => Ok(EventLogBackend::Memory),
            "surreal" | "surrealdb" => Ok(EventLogBackend::Surreal),
            other => Err(format!("unsupported backend {other} (expected memory|surreal)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Job store documents.
    pub storage: StorageConfig,
    pub event_log: EventLogBackend,
    /// Used when `event_log` is `Surreal`.
    pub db: DbConfig,
    pub worker: WorkerConfig,
    pub relay: RelayConfig,
    /// Steps per simulated job.
    pub job_steps: u32,
    /// Duration of one simulated step.
    pub job_step: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            storage: StorageConfig::filesystem(StorageConfig::DEFAULT_FS_ROOT),
            event_log: EventLogBackend::Memory,
            db: DbConfig::default(),
            worker: WorkerConfig::default(),
            relay: RelayConfig::default(),
            job_steps: SimulatedHandler::DEFAULT_STEPS,
            job_step: SimulatedHandler::DEFAULT_STEP_DELAY,
        }
    }
}

impl AppConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_vars(|name| std::env::var(name).ok())?;
        config.storage = StorageConfig::from_env()?;
        config.db = DbConfig::from_env();
        Ok(config)
    }

    /// Read every scalar setting through `lookup`. Storage and database
    /// settings keep their defaults.
    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let vars = Vars(lookup);

        Ok(Self {
            host: vars.get("HOST").unwrap_or(d.host),
            port: vars.parse("PORT", d.port)?,
            event_log: vars.parse("EVENT_LOG_BACKEND", d.event_log)?,
            worker: WorkerConfig {
                poll_interval: vars.millis("WORKER_POLL_MS", d.worker.poll_interval)?,
                error_backoff: vars.millis("WORKER_ERROR_BACKOFF_MS", d.worker.error_backoff)?,
                max_log_len: vars.parse("EVENT_LOG_MAX_LEN", d.worker.max_log_len)?,
            },
            relay: RelayConfig {
                poll_interval: vars.positive_millis("RELAY_POLL_MS", d.relay.poll_interval)?,
                batch_size: vars.positive("RELAY_BATCH_SIZE", d.relay.batch_size)?,
                close_grace: vars.millis("RELAY_CLOSE_GRACE_MS", d.relay.close_grace)?,
                replay_settle: vars.millis("RELAY_REPLAY_SETTLE_MS", d.relay.replay_settle)?,
                replay_pacing: vars.millis("RELAY_REPLAY_PACING_MS", d.relay.replay_pacing)?,
                ..d.relay
            },
            job_steps: vars.parse("JOB_STEPS", d.job_steps)?,
            job_step: vars.millis("JOB_STEP_MS", d.job_step)?,
            ..d
        })
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).and_then(non_empty)
    }

    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
        }
    }

    /// Like `parse`, rejecting zero.
    fn positive(&self, name: &'static str, default: usize) -> Result<usize, ConfigError> {
        let value = self.parse(name, default)?;
        if value == 0 {
            return Err(zero(name));
        }
        Ok(value)
    }

    fn millis(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.parse(name, default_ms).map(Duration::from_millis)
    }

    fn positive_millis(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let value = self.millis(name, default)?;
        if value.is_zero() {
            return Err(zero(name));
        }
        Ok(value)
    }
}

fn zero(name: &'static str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: "0".to_string(),
        reason: "must be greater than zero".to_string(),
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
