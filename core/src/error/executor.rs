use thiserror::Error;

use super::code::ErrorCode;
use crate::task::TaskTransitionError;

/// Executor faults: programming or configuration errors that are fatal to
/// the current run. Partial task failure is never reported through this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("No handler registered for data source '{source_id}' (task '{task_id}')")]
    HandlerNotFound { task_id: String, source_id: String },

    #[error("Task '{0}' declares no data source")]
    NoDataSource(String),

    #[error("Task not found in plan: {0}")]
    TaskNotFound(String),

    #[error("Task lifecycle error: {0}")]
    Lifecycle(#[from] TaskTransitionError),

    #[error("Runner error: {0}")]
    Runner(String),
}

impl ExecutorError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::HandlerNotFound { .. } => ErrorCode::HandlerNotFound,
            Self::NoDataSource(_) => ErrorCode::NoDataSource,
            Self::TaskNotFound(_) => ErrorCode::ValidationError,
            Self::Lifecycle(_) => ErrorCode::InvalidTransition,
            Self::Runner(_) => ErrorCode::GeneralError,
        }
    }
}

/// Failure reported by an external task handler. Recorded on the task, never
/// propagated past the executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(err.to_string())
    }
}
