use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::{TaskPriority, TaskStatus};

/// Outcome of one task within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,

    /// Completed, Failed or Skipped
    pub status: TaskStatus,

    /// Attempts started (0 for skipped tasks)
    pub attempts: u32,

    pub retries_used: u32,

    /// Time spent across all attempts, in milliseconds
    pub duration_ms: u64,

    /// Handler output of the successful attempt
    #[serde(default)]
    pub output: Option<Value>,

    /// Error of the last failed attempt, or the skip reason
    #[serde(default)]
    pub last_error: Option<String>,

    /// At least one attempt hit the task timeout
    #[serde(default)]
    pub timed_out: bool,

    pub priority: TaskPriority,
}

impl TaskRecord {
    pub(crate) fn skipped(task_id: &str, priority: TaskPriority, reason: impl Into<String>) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Skipped,
            attempts: 0,
            retries_used: 0,
            duration_ms: 0,
            output: None,
            last_error: Some(reason.into()),
            timed_out: false,
            priority,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Result of executing an [`crate::planner::ExecutionPlan`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,

    /// task_id -> record
    pub records: BTreeMap<String, TaskRecord>,

    /// Critical tasks that terminally failed, in the order they finished
    pub critical_failures: Vec<String>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    pub batches_run: usize,

    /// A safety pause cut the run short
    pub halted: bool,
}

impl ExecutionSummary {
    pub(crate) fn from_records(
        records: BTreeMap<String, TaskRecord>,
        critical_failures: Vec<String>,
        duration_ms: u64,
        batches_run: usize,
        halted: bool,
    ) -> Self {
        let count = |status: TaskStatus| records.values().filter(|r| r.status == status).count();
        Self {
            completed: count(TaskStatus::Completed),
            failed: count(TaskStatus::Failed),
            skipped: count(TaskStatus::Skipped),
            records,
            critical_failures,
            duration_ms,
            batches_run,
            halted,
        }
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Completed ÷ total, 0.0 for an empty summary.
    pub fn success_ratio(&self) -> f64 {
        if self.records.is_empty() {
            0.0
        } else {
            self.completed as f64 / self.records.len() as f64
        }
    }

    pub fn total_retries(&self) -> u32 {
        self.records.values().map(|r| r.retries_used).sum()
    }

    pub fn record(&self, task_id: &str) -> Option<&TaskRecord> {
        self.records.get(task_id)
    }

    pub fn output(&self, task_id: &str) -> Option<&Value> {
        self.records
            .get(task_id)
            .filter(|r| r.is_completed())
            .and_then(|r| r.output.as_ref())
    }

    pub fn completed_ids(&self) -> impl Iterator<Item = &str> {
        self.records
            .values()
            .filter(|r| r.is_completed())
            .map(|r| r.task_id.as_str())
    }

    /// Combine an earlier run with a supplemental one. Records of `later`
    /// replace earlier records of the same id unless the earlier one
    /// completed.
    pub fn merge(&self, later: &ExecutionSummary) -> ExecutionSummary {
        let mut records = self.records.clone();
        for (id, record) in &later.records {
            let keep_earlier = records.get(id).is_some_and(TaskRecord::is_completed);
            if !keep_earlier {
                records.insert(id.clone(), record.clone());
            }
        }

        let mut critical_failures: Vec<String> = Vec::new();
        for id in self.critical_failures.iter().chain(&later.critical_failures) {
            let still_failed = records
                .get(id)
                .is_some_and(|r| r.status == TaskStatus::Failed);
            if still_failed && !critical_failures.contains(id) {
                critical_failures.push(id.clone());
            }
        }

        Self::from_records(
            records,
            critical_failures,
            self.duration_ms.saturating_add(later.duration_ms),
            self.batches_run + later.batches_run,
            self.halted || later.halted,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, status: TaskStatus, priority: TaskPriority) -> TaskRecord {
        TaskRecord {
            task_id: id.to_string(),
            status,
            attempts: 1,
            retries_used: 0,
            duration_ms: 10,
            output: (status == TaskStatus::Completed).then(|| json!({ "id": id })),
            last_error: None,
            timed_out: false,
            priority,
        }
    }

    fn summary(records: Vec<TaskRecord>, critical_failures: &[&str]) -> ExecutionSummary {
        ExecutionSummary::from_records(
            records.into_iter().map(|r| (r.task_id.clone(), r)).collect(),
            critical_failures.iter().map(|s| s.to_string()).collect(),
            100,
            1,
            false,
        )
    }

    #[test]
    fn test_counts_and_ratio() {
        let s = summary(
            vec![
                record("a", TaskStatus::Completed, TaskPriority::High),
                record("b", TaskStatus::Failed, TaskPriority::Critical),
                record("c", TaskStatus::Skipped, TaskPriority::Low),
                record("d", TaskStatus::Completed, TaskPriority::Low),
            ],
            &["b"],
        );
        assert_eq!((s.completed, s.failed, s.skipped), (2, 1, 1));
        assert!((s.success_ratio() - 0.5).abs() < f64::EPSILON);
        assert_eq!(s.output("a"), Some(&json!({ "id": "a" })));
        assert_eq!(s.output("b"), None);
        assert_eq!(ExecutionSummary::default().success_ratio(), 0.0);
    }

    #[test]
    fn test_merge_keeps_completed_and_clears_recovered_failures() {
        let first = summary(
            vec![
                record("a", TaskStatus::Completed, TaskPriority::Critical),
                record("b", TaskStatus::Failed, TaskPriority::Critical),
            ],
            &["b"],
        );
        let mut rerun_a = record("a", TaskStatus::Failed, TaskPriority::Critical);
        rerun_a.last_error = Some("should not replace".into());
        let second = summary(
            vec![rerun_a, record("b", TaskStatus::Completed, TaskPriority::Critical)],
            &["a"],
        );

        let merged = first.merge(&second);
        assert_eq!(merged.completed, 2);
        assert_eq!(merged.failed, 0);
        assert!(merged.critical_failures.is_empty());
        assert_eq!(merged.duration_ms, 200);
        assert_eq!(merged.batches_run, 2);
        assert_eq!(merged.record("a").unwrap().last_error, None);
    }
}
