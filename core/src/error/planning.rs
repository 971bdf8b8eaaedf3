use thiserror::Error;

use super::code::ErrorCode;

/// Errors raised while building an execution plan.
///
/// Always raised before any task executes, so a failed planning cycle never
/// leaves partial state behind. Re-planning with an adjusted profile is the
/// recovery path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("Dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    DependencyNotFound {
        task_id: String,
        missing_dep: String,
    },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Budget exceeded: estimated cost {estimated:.2} exceeds cap {cap:.2} and no optional task can be dropped")]
    BudgetExceeded { estimated: f64, cap: f64 },
}

impl PlanningError {
    /// Every variant except [`PlanningError::BudgetExceeded`] is a structural
    /// defect of the graph.
    pub fn is_invalid_plan(&self) -> bool {
        !matches!(self, Self::BudgetExceeded { .. })
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateTaskId(_) => ErrorCode::DuplicateTask,
            Self::DependencyNotFound { .. } => ErrorCode::DependencyError,
            Self::CircularDependency(_) => ErrorCode::CircularDependency,
            Self::InvalidPlan(_) => ErrorCode::ValidationError,
            Self::BudgetExceeded { .. } => ErrorCode::BudgetExceeded,
        }
    }
}
