//! Error types for the state-gated deferred invocation queue.

use crate::operation::OperationId;
use thiserror::Error;

/// Boxed error raised by an operation body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single late-bound call that returned an error when it ran.
#[derive(Debug, Error)]
#[error("operation {operation} (#{seq}) failed: {error}")]
pub struct OperationFailure {
    pub operation: OperationId,
    /// Submission sequence number of the failed call
    pub seq: u64,
    #[source]
    pub error: BoxError,
}

/// Queue-related errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Unresolved operation {operation}: {reason}")]
    UnresolvedOperation { operation: String, reason: String },

    #[error("Operation {operation} cannot be deferred: {reason}")]
    DisallowedOperation { operation: OperationId, reason: String },

    #[error("Invalid argument shape for `{operation}`: {reason}")]
    ArgumentShape { operation: String, reason: String },

    #[error(transparent)]
    OperationFailed(OperationFailure),

    #[error("{} deferred operation(s) failed while advancing to {state}", .failures.len())]
    FlushFailed {
        state: String,
        failures: Vec<OperationFailure>,
    },
}

impl QueueError {
    /// Failures carried by this error, if it reports executed calls.
    pub fn failures(&self) -> &[OperationFailure] {
        match self {
            QueueError::OperationFailed(failure) => std::slice::from_ref(failure),
            QueueError::FlushFailed { failures, .. } => failures,
            _ => &[],
        }
    }

    /// True for authoring errors rejected before anything was queued or run.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            QueueError::UnresolvedOperation { .. }
                | QueueError::DisallowedOperation { .. }
                | QueueError::ArgumentShape { .. }
        )
    }
}

/// Operation registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Operation already registered: {0}")]
    Duplicate(OperationId),
}

/// Errors surfaced by the configuration, logging and replay layers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Script error: {0}")]
    ScriptError(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
