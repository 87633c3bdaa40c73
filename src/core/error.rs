//! Error types for the session logger

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The async worker thread could not be started
    #[error("Failed to spawn async log worker: {source}")]
    WorkerSpawn {
        #[source]
        source: std::io::Error,
    },

    /// No free work item was available for an operation that must be queued
    #[error("Work item pool exhausted: {capacity} items in use")]
    PoolExhausted { capacity: usize },

    /// The engine has already been shut down
    #[error("Async log engine already stopped")]
    EngineStopped,

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    pub fn worker_spawn(source: std::io::Error) -> Self {
        LoggerError::WorkerSpawn { source }
    }

    pub fn pool_exhausted(capacity: usize) -> Self {
        LoggerError::PoolExhausted { capacity }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }
}
