//! Task planner: turns a decision request into a batched task graph.
//!
//! ```text
//! TemplateCatalog::templates()
//!   ↓  filter by PlanningProfile, instantiate against RequestContext
//! Vec<Task>
//!   ↓
//! TaskGraph::validate() → duplicate ids, missing deps, cycles
//!   ↓
//! budget::fit_to_budget() → drop optional tasks (stable rule)
//!   ↓
//! TaskGraph::topological_sort_by(priority) → Vec<Vec<String>> (batches)
//!   ↓
//! ExecutionPlan { batches, estimates, ... }
//! ```

mod budget;
pub mod context;
pub mod graph;
pub mod plan;
pub mod profile;
pub mod template;

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::PlannerConfig;
use crate::error::PlanningError;
use crate::task::Task;

pub use context::RequestContext;
pub use graph::TaskGraph;
pub use plan::{ExecutionPlan, PlanEstimates, PlanSummary};
pub use profile::{PlanningProfile, RiskProfile};
pub use template::{StaticCatalog, TaskTemplate, TemplateCatalog};

#[derive(Clone)]
pub struct TaskPlanner {
    catalog: Arc<dyn TemplateCatalog>,
    config: PlannerConfig,
}

impl TaskPlanner {
    pub fn new(catalog: Arc<dyn TemplateCatalog>, config: PlannerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Build the initial plan (revision 1) for a request.
    pub fn plan(
        &self,
        ctx: &RequestContext,
        profile: &PlanningProfile,
    ) -> Result<ExecutionPlan, PlanningError> {
        let tasks = self.applicable_tasks(ctx, profile);
        if tasks.is_empty() {
            return Err(PlanningError::InvalidPlan(format!(
                "catalog '{}' produced no tasks for profile '{}'",
                self.catalog.name(),
                profile.risk
            )));
        }

        let plan = self.plan_tasks(ctx, profile, tasks, 1)?;
        tracing::info!(
            "research plan created for {}: {} tasks in {} batches, cost {:.2}, est. {}ms (speedup {:.1}x)",
            plan.symbol,
            plan.task_count(),
            plan.batches().len(),
            plan.estimates.total_cost,
            plan.estimates.parallel_ms,
            plan.estimates.speedup
        );
        Ok(plan)
    }

    /// Plan only the tasks needed to fill `missing_sources`.
    ///
    /// Tasks in `satisfied` already completed in an earlier round: they are
    /// never re-planned, and dependencies on them count as met. Unsatisfied
    /// dependencies of a selected task are pulled in transitively. The
    /// result may be empty when no applicable template covers the gaps.
    pub fn plan_supplemental(
        &self,
        ctx: &RequestContext,
        profile: &PlanningProfile,
        missing_sources: &[String],
        satisfied: &HashSet<String>,
        revision: u32,
    ) -> Result<ExecutionPlan, PlanningError> {
        let candidates = self.applicable_tasks(ctx, profile);
        let missing: HashSet<&str> = missing_sources.iter().map(String::as_str).collect();

        let mut selected: HashSet<String> = candidates
            .iter()
            .filter(|t| !satisfied.contains(&t.id))
            .filter(|t| t.data_sources.iter().any(|s| missing.contains(s.as_str())))
            .map(|t| t.id.clone())
            .collect();

        let mut frontier: Vec<String> = selected.iter().cloned().collect();
        while let Some(id) = frontier.pop() {
            let Some(task) = candidates.iter().find(|t| t.id == id) else {
                continue;
            };
            for dep in &task.dependencies {
                if !satisfied.contains(dep) && selected.insert(dep.clone()) {
                    frontier.push(dep.clone());
                }
            }
        }

        let tasks: Vec<Task> = candidates
            .into_iter()
            .filter(|t| selected.contains(&t.id))
            .collect();

        let plan = self.plan_tasks_with_external(ctx, profile, tasks, revision, satisfied)?;
        tracing::info!(
            "supplemental plan r{} for {}: {} tasks covering {:?}",
            revision,
            plan.symbol,
            plan.task_count(),
            missing_sources
        );
        Ok(plan)
    }

    /// Plan an explicit task list with the same validation, budget and
    /// batching rules as [`TaskPlanner::plan`].
    pub fn plan_tasks(
        &self,
        ctx: &RequestContext,
        profile: &PlanningProfile,
        tasks: Vec<Task>,
        revision: u32,
    ) -> Result<ExecutionPlan, PlanningError> {
        self.plan_tasks_with_external(ctx, profile, tasks, revision, &HashSet::new())
    }

    fn plan_tasks_with_external(
        &self,
        ctx: &RequestContext,
        profile: &PlanningProfile,
        tasks: Vec<Task>,
        revision: u32,
        satisfied: &HashSet<String>,
    ) -> Result<ExecutionPlan, PlanningError> {
        let mut external: Vec<String> = Vec::new();
        for dep in tasks.iter().flat_map(|t| t.dependencies.iter()) {
            if satisfied.contains(dep) && !external.contains(dep) {
                external.push(dep.clone());
            }
        }

        // The graph only sees in-plan edges; the tasks keep their full
        // dependency lists so the executor can forward prior outputs.
        let graph_view = |tasks: &[Task]| -> Vec<Task> {
            tasks
                .iter()
                .map(|t| {
                    let mut t = t.clone();
                    t.dependencies.retain(|d| !satisfied.contains(d));
                    t
                })
                .collect()
        };

        TaskGraph::from_tasks(&graph_view(&tasks))?.validate()?;

        let (tasks, dropped) = match profile.budget_cap.or(self.config.budget_cap) {
            Some(cap) => budget::fit_to_budget(tasks, cap)?,
            None => (tasks, Vec::new()),
        };
        if !dropped.is_empty() {
            tracing::warn!(
                "dropped {} optional task(s) to fit budget: {}",
                dropped.len(),
                dropped.join(", ")
            );
        }

        let graph = TaskGraph::from_tasks(&graph_view(&tasks))?;
        let batches = graph.topological_sort_by(|t| t.priority)?;

        Ok(ExecutionPlan::new(
            ctx.symbol.clone(),
            profile.risk.to_string(),
            revision,
            tasks,
            batches,
            profile.max_parallel_tasks.max(1),
            dropped,
            external,
        ))
    }

    fn applicable_tasks(&self, ctx: &RequestContext, profile: &PlanningProfile) -> Vec<Task> {
        self.catalog
            .templates()
            .iter()
            .filter(|t| t.applies_to(profile))
            .map(|t| t.instantiate(ctx, profile))
            .collect()
    }
}
