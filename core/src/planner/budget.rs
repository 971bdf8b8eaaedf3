//! Budget fitting: drops optional tasks until the plan cost fits the cap.
//!
//! Pruning order is stable: lowest priority first, then highest estimated
//! cost, then the most recently inserted task. A task is prunable only when
//! every task that (transitively) depends on it is optional as well; those
//! dependents are dropped together with it.

use std::collections::HashSet;

use crate::error::PlanningError;
use crate::task::Task;

use super::graph::TaskGraph;

const COST_EPSILON: f64 = 1e-9;

pub(crate) fn total_cost(tasks: &[Task]) -> f64 {
    tasks.iter().map(|t| t.estimated_cost).sum()
}

/// Returns the retained tasks (original order preserved) and the ids that
/// were dropped, in drop order.
pub(crate) fn fit_to_budget(
    mut tasks: Vec<Task>,
    cap: f64,
) -> Result<(Vec<Task>, Vec<String>), PlanningError> {
    let mut dropped: Vec<String> = Vec::new();

    loop {
        let estimated = total_cost(&tasks);
        if estimated <= cap + COST_EPSILON {
            return Ok((tasks, dropped));
        }

        let graph = TaskGraph::from_tasks(&tasks)?;

        let candidate = tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.optional)
            .filter_map(|(idx, t)| {
                let dependents = graph.transitive_dependents(&t.id);
                let all_optional = dependents
                    .iter()
                    .all(|d| graph.nodes.get(d).is_some_and(|n| n.optional));
                all_optional.then_some((idx, t, dependents))
            })
            .max_by(|(ia, a, _), (ib, b, _)| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| a.estimated_cost.total_cmp(&b.estimated_cost))
                    .then_with(|| ia.cmp(ib))
            })
            .map(|(_, t, dependents)| (t.id.clone(), dependents));

        let Some((victim, dependents)) = candidate else {
            return Err(PlanningError::BudgetExceeded { estimated, cap });
        };

        tracing::debug!(
            "dropping optional task '{}' (+{} dependents) to fit budget {:.2}",
            victim,
            dependents.len(),
            cap
        );

        let mut remove: HashSet<String> = dependents.into_iter().collect();
        remove.insert(victim.clone());
        dropped.push(victim);
        for id in tasks.iter().map(|t| &t.id).filter(|id| remove.contains(*id)) {
            if !dropped.contains(id) {
                dropped.push(id.clone());
            }
        }
        tasks.retain(|t| !remove.contains(&t.id));
    }
}
