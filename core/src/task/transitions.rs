//! Task lifecycle transition rules

use thiserror::Error;

use super::types::{Task, TaskStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskTransitionError {
    #[error("Invalid task transition from {from:?} to {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("Task '{task_id}' exhausted its {max_attempts} attempts")]
    RetriesExhausted { task_id: String, max_attempts: u32 },
}

pub struct TaskTransition;

impl TaskTransition {
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TaskTransitionError> {
        let is_valid = matches!(
            (from, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Skipped)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
                // retry
                | (TaskStatus::Failed, TaskStatus::Pending)
        );

        if is_valid {
            Ok(())
        } else {
            Err(TaskTransitionError::InvalidTransition { from, to })
        }
    }
}

impl Task {
    fn transition(&mut self, to: TaskStatus) -> Result<(), TaskTransitionError> {
        TaskTransition::validate(self.status, to)?;
        self.status = to;
        Ok(())
    }

    pub fn mark_running(&mut self) -> Result<(), TaskTransitionError> {
        self.transition(TaskStatus::Running)?;
        self.attempts += 1;
        Ok(())
    }

    pub fn mark_completed(&mut self) -> Result<(), TaskTransitionError> {
        self.transition(TaskStatus::Completed)
    }

    pub fn mark_failed(&mut self) -> Result<(), TaskTransitionError> {
        self.transition(TaskStatus::Failed)
    }

    pub fn mark_skipped(&mut self) -> Result<(), TaskTransitionError> {
        self.transition(TaskStatus::Skipped)
    }

    /// Failed → Pending, allowed while attempts remain.
    pub fn requeue(&mut self) -> Result<(), TaskTransitionError> {
        if self.remaining_attempts() == 0 {
            return Err(TaskTransitionError::RetriesExhausted {
                task_id: self.id.clone(),
                max_attempts: self.max_retries + 1,
            });
        }
        self.transition(TaskStatus::Pending)
    }

    /// Failed and no attempts left.
    pub fn is_terminally_failed(&self) -> bool {
        self.status == TaskStatus::Failed && self.remaining_attempts() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPriority;

    #[test]
    fn test_valid_transitions() {
        assert!(TaskTransition::validate(TaskStatus::Pending, TaskStatus::Running).is_ok());
        assert!(TaskTransition::validate(TaskStatus::Running, TaskStatus::Completed).is_ok());
        assert!(TaskTransition::validate(TaskStatus::Failed, TaskStatus::Pending).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(TaskTransition::validate(TaskStatus::Pending, TaskStatus::Completed).is_err());
        assert!(TaskTransition::validate(TaskStatus::Completed, TaskStatus::Pending).is_err());
        assert!(TaskTransition::validate(TaskStatus::Skipped, TaskStatus::Running).is_err());
    }

    #[test]
    fn test_retry_cycle_is_bounded() {
        let mut task = Task::new("t", "T", TaskPriority::High).with_max_retries(1);

        task.mark_running().unwrap();
        task.mark_failed().unwrap();
        assert!(!task.is_terminally_failed());
        task.requeue().unwrap();

        task.mark_running().unwrap();
        task.mark_failed().unwrap();
        assert!(task.is_terminally_failed());
        assert_eq!(
            task.requeue(),
            Err(TaskTransitionError::RetriesExhausted {
                task_id: "t".into(),
                max_attempts: 2
            })
        );
        assert_eq!(task.attempts, 2);
    }
}
