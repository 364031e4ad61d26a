//! Error types for the block pipeline.

use thiserror::Error;

/// Errors surfaced by the pipeline, its block sources and the retry helper.
///
/// Only `Validation`, `InvalidHandler` and `NoHandlers` are ever returned from
/// `Pipeline::start`/`Pipeline::push`. The remaining variants describe failures
/// that are logged or handed to a block source callback.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Invalid handler: {0}")]
    InvalidHandler(String),

    #[error("No handlers installed in pipeline")]
    NoHandlers,

    #[error("Handler error in '{handler}': {reason}")]
    HandlerFailure { handler: String, reason: String },

    #[error("Block source error: {0}")]
    SourceFailure(String),

    #[error("{operation} failed after {attempts} attempts: {reason}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        reason: String,
    },

    #[error("{operation} stopped retrying after {attempts} attempts")]
    RetryAborted { operation: String, attempts: u32 },
}
