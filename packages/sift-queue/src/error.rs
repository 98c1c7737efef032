use thiserror::Error;

/// Failure raised by a background task while producing progress.
///
/// Workers log these and move on to the next queued task; they never reach
/// the caller that enqueued the task.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}

/// Queue configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("At least 2 workers are required (one interactive, one background), got {0}")]
    TooFewWorkers(usize),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
