use thiserror::Error;

use super::code::ErrorCode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SafetyError {
    #[error("safety enforcer is not paused")]
    NotPaused,

    #[error("{count} violation(s) in the last {window_secs}s; force the resume to override")]
    RecentViolations { count: usize, window_secs: u64 },
}

impl SafetyError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotPaused => ErrorCode::NotPaused,
            Self::RecentViolations { .. } => ErrorCode::RecentViolations,
        }
    }
}
