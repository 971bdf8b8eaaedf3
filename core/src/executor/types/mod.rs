pub mod result;

pub use result::{ExecutionSummary, TaskRecord};
