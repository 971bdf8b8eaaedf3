use thiserror::Error;

use super::code::ErrorCode;
use super::executor::ExecutorError;
use super::planning::PlanningError;
use crate::pipeline::TransitionError;

/// Errors surfaced to the caller of a pipeline run.
///
/// A safety halt is not represented here: it is a regular
/// [`crate::pipeline::PipelineOutcome::Halted`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),
    #[error("executor fault: {0}")]
    Executor(#[from] ExecutorError),
    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
    #[error("optimizer failed: {0}")]
    Strategy(#[from] StrategyError),
    #[error("state machine error: {0}")]
    Transition(#[from] TransitionError),
}

impl PipelineError {
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Planning(e) => e.error_code(),
            Self::Executor(e) => e.error_code(),
            Self::Stage { .. } => ErrorCode::StageError,
            Self::Strategy(_) => ErrorCode::StrategyError,
            Self::Transition(_) => ErrorCode::InvalidTransition,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("strategy '{0}' timed out")]
    Timeout(String),
    #[error("strategy '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("cannot determine home directory")]
    NoHomeDir,
}

impl ConfigError {
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::ConfigError
    }
}
