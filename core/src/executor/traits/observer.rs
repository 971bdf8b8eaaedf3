use async_trait::async_trait;

use crate::executor::types::{ExecutionSummary, TaskRecord};

/// Receives plan, batch and task lifecycle events. Called inline from the
/// running tasks, so implementations should return quickly.
#[async_trait]
pub trait ExecutionObserver: Send + Sync {
    fn name(&self) -> &str;
    async fn on_event(&self, event: &ExecutionEvent);
}

#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PlanStarted {
        revision: u32,
        total_tasks: usize,
        total_batches: usize,
    },
    BatchStarted {
        batch: usize,
        task_ids: Vec<String>,
    },
    TaskStarted {
        task_id: String,
        attempt: u32,
    },
    TaskAttemptFailed {
        task_id: String,
        attempt: u32,
        error: String,
        timed_out: bool,
        will_retry: bool,
    },
    TaskFinished {
        record: TaskRecord,
    },
    BatchFinished {
        batch: usize,
    },
    PlanFinished {
        summary: ExecutionSummary,
    },
}
