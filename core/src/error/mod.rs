pub mod code;
#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod planning;
pub mod safety;

pub use code::ErrorCode;
pub use error::{ConfigError, PipelineError, StrategyError};
pub use executor::{ExecutorError, HandlerError};
pub use planning::PlanningError;
pub use safety::SafetyError;
