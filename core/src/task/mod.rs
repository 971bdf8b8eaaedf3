pub mod transitions;
pub mod types;

pub use transitions::{TaskTransition, TaskTransitionError};
pub use types::{Task, TaskLike, TaskPriority, TaskStatus};
