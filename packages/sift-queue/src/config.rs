use crate::error::{ConfigError, Result};
use crate::types::Slot;
use serde::Serialize;
use std::env;

pub const WORKERS_ENV: &str = "SIFT_QUEUE_WORKERS";
pub const NOTIFY_CAPACITY_ENV: &str = "SIFT_QUEUE_NOTIFY_CAPACITY";

const DEFAULT_WORKER_COUNT: usize = 3;
const DEFAULT_NOTIFICATION_CAPACITY: usize = 1000;

/// Configuration for the task queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    /// Number of workers. The last one is the background slot; all others
    /// take interactive tasks.
    pub worker_count: usize,
    /// Broadcast capacity for aggregated progress notifications
    pub notification_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl QueueConfig {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Missing keys fall
    /// back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            worker_count: parse_var(&lookup, WORKERS_ENV, defaults.worker_count)?,
            notification_capacity: parse_var(
                &lookup,
                NOTIFY_CAPACITY_ENV,
                defaults.notification_capacity,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count < 2 {
            return Err(ConfigError::TooFewWorkers(self.worker_count));
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "notification capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interactive_slots(&self) -> usize {
        self.worker_count - 1
    }

    pub fn background_index(&self) -> usize {
        self.worker_count - 1
    }

    /// Role of the worker at `index`.
    pub fn slot_of(&self, index: usize) -> Slot {
        if index >= self.background_index() {
            Slot::Background
        } else {
            Slot::Interactive(index)
        }
    }
}

fn parse_var<F>(lookup: &F, key: &str, default: usize) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}={:?} is not a count", key, raw))),
        None => Ok(default),
    }
}
