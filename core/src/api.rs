//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `vigil_core::api` instead of reaching into internal modules.

pub use crate::config::{
    get_vigil_data_dir, load_default, load_from_path, AppConfig, ExecutorConfig, LoggingConfig,
    OptimizerConfig, PipelineConfig, PlannerConfig, RetryConfig, SafetyConfig,
};
pub use crate::error::{
    ConfigError, ErrorCode, ExecutorError, HandlerError, PipelineError, PlanningError,
    SafetyError, StrategyError,
};
pub use crate::executor::{
    handler_fn, ExecutionEvent, ExecutionObserver, ExecutionSummary, HandlerContext,
    HandlerRegistry, ImmediateRetry, RetryStrategy, TaskExecutor, TaskHandler, TaskRecord,
};
pub use crate::optimizer::{FallbackSelector, OptimizationResult, OptimizationStrategy};
pub use crate::pipeline::{
    Decision, DecisionAction, DecisionInput, DecisionMaker, DecisionReport, EvaluationStage,
    HaltReport, PipelineController, PipelineOutcome, PipelineRun, PipelineStage, StatusSnapshot,
    ValidationInput, ValidationJudgment, Validator,
};
pub use crate::planner::{
    ExecutionPlan, PlanEstimates, PlanSummary, PlanningProfile, RequestContext, RiskProfile,
    StaticCatalog, TaskPlanner, TaskTemplate, TemplateCatalog,
};
pub use crate::safety::{
    SafetyEnforcer, SafetyEvent, SafetyMode, SafetySignal, SafetyState, SafetyStatus, TriggerKind,
    TriggerRecord,
};
pub use crate::task::{Task, TaskPriority, TaskStatus};
