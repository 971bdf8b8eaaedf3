//! Batch executor for planned research tasks.
//!
//! ```text
//! ExecutionPlan { batches }
//!   ↓
//! HandlerRegistry::resolve_plan() → every task has a handler, or ExecutorError
//!   ↓
//! for batch in batches (strictly sequential):
//!     skip tasks whose dependencies did not complete
//!     execute_batch_parallel() → semaphore-bounded, per-attempt timeout, retries
//!   ↓
//! ExecutionSummary { records keyed by task id }
//! ```

mod engine;
mod registry;
mod scheduler;
pub mod traits;
pub mod types;

pub use engine::TaskExecutor;
pub use registry::HandlerRegistry;
pub use scheduler::execute_batch_parallel;
pub use traits::{
    handler_fn, ExecutionEvent, ExecutionObserver, FnHandler, HandlerContext, ImmediateRetry,
    RetryStrategy, TaskHandler,
};
pub use types::{ExecutionSummary, TaskRecord};
