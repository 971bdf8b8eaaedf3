use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskPriority};

/// Reporting-only projections. Never used for scheduling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanEstimates {
    pub total_cost: f64,
    pub sequential_ms: u64,
    pub parallel_ms: u64,
    pub speedup: f64,
}

/// Immutable output of one planning cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub symbol: String,
    pub profile: String,
    /// Research revision this plan was built for (1 for the initial plan).
    pub revision: u32,
    /// Planned tasks in insertion order.
    tasks: Vec<Task>,
    batches: Vec<Vec<String>>,
    /// Concurrency requested by the planning profile.
    pub max_parallel: usize,
    pub estimates: PlanEstimates,
    /// Optional tasks removed to fit the budget.
    pub dropped_tasks: Vec<String>,
    /// Dependencies outside this plan that an earlier round already completed.
    pub external_dependencies: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ExecutionPlan {
    pub(crate) fn new(
        symbol: String,
        profile: String,
        revision: u32,
        tasks: Vec<Task>,
        batches: Vec<Vec<String>>,
        max_parallel: usize,
        dropped_tasks: Vec<String>,
        external_dependencies: Vec<String>,
    ) -> Self {
        let index: HashMap<String, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();

        let sequential_ms: u64 = tasks.iter().map(|t| t.estimated_duration_ms).sum();
        let parallel_ms: u64 = batches
            .iter()
            .map(|batch| {
                batch
                    .iter()
                    .filter_map(|id| index.get(id).map(|&i| tasks[i].estimated_duration_ms))
                    .max()
                    .unwrap_or(0)
            })
            .sum();
        let speedup = if parallel_ms > 0 {
            sequential_ms as f64 / parallel_ms as f64
        } else {
            1.0
        };

        let estimates = PlanEstimates {
            total_cost: tasks.iter().map(|t| t.estimated_cost).sum(),
            sequential_ms,
            parallel_ms,
            speedup,
        };

        Self {
            symbol,
            profile,
            revision,
            tasks,
            batches,
            max_parallel,
            estimates,
            dropped_tasks,
            external_dependencies,
            index,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn batches(&self) -> &[Vec<String>] {
        &self.batches
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        match self.index.get(id) {
            Some(&i) => self.tasks.get(i),
            // index is not serialized
            None => self.tasks.iter().find(|t| t.id == id),
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn count_by_priority(&self, priority: TaskPriority) -> usize {
        self.tasks.iter().filter(|t| t.priority == priority).count()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            symbol: self.symbol.clone(),
            profile: self.profile.clone(),
            revision: self.revision,
            task_count: self.tasks.len(),
            critical_tasks: self.count_by_priority(TaskPriority::Critical),
            batch_count: self.batches.len(),
            estimates: self.estimates,
            dropped_tasks: self.dropped_tasks.clone(),
        }
    }
}

/// Human-readable plan report.
impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Research plan for {} ({} profile, revision {})",
            self.symbol, self.profile, self.revision
        )?;
        writeln!(f)?;
        writeln!(f, "Task breakdown:")?;
        writeln!(f, "  total: {}", self.tasks.len())?;
        for priority in [
            TaskPriority::Critical,
            TaskPriority::High,
            TaskPriority::Medium,
            TaskPriority::Low,
        ] {
            writeln!(f, "  {}: {}", priority, self.count_by_priority(priority))?;
        }
        writeln!(f)?;
        writeln!(f, "Execution strategy:")?;
        writeln!(f, "  batches: {}", self.batches.len())?;
        writeln!(f, "  max parallel: {}", self.max_parallel)?;
        writeln!(f, "  sequential time: {}ms", self.estimates.sequential_ms)?;
        writeln!(f, "  parallel time: {}ms", self.estimates.parallel_ms)?;
        writeln!(f, "  speedup: {:.1}x", self.estimates.speedup)?;
        writeln!(f)?;
        writeln!(f, "Estimated cost: {:.2}", self.estimates.total_cost)?;
        if !self.dropped_tasks.is_empty() {
            writeln!(f, "Dropped to fit budget: {}", self.dropped_tasks.join(", "))?;
        }
        writeln!(f)?;
        // no trailing newline after the last batch
        write!(f, "Execution order:")?;
        for (i, batch) in self.batches.iter().enumerate() {
            let names: Vec<&str> = batch
                .iter()
                .filter_map(|id| self.task(id).map(|t| t.name.as_str()))
                .collect();
            if names.len() == 1 {
                write!(f, "\n  {}. {}", i + 1, names[0])?;
            } else {
                write!(f, "\n  {}. parallel: {}", i + 1, names.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Compact plan view exposed through the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub symbol: String,
    pub profile: String,
    pub revision: u32,
    pub task_count: usize,
    pub critical_tasks: usize,
    pub batch_count: usize,
    pub estimates: PlanEstimates,
    pub dropped_tasks: Vec<String>,
}
