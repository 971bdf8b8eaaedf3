use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ExecutorError;
use crate::planner::ExecutionPlan;

use super::traits::TaskHandler;

/// Data-source id -> handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `source`, replacing any earlier one.
    pub fn register(&mut self, source: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(source.into(), handler);
    }

    pub fn with_handler(mut self, source: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(source, handler);
        self
    }

    pub fn get(&self, source: &str) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(source)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.handlers.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Sorted list of registered source ids.
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        sources.sort_unstable();
        sources
    }

    /// Resolve the handler of every task in the plan, failing on the first
    /// task (in plan order) that cannot run.
    pub fn resolve_plan(
        &self,
        plan: &ExecutionPlan,
    ) -> Result<HashMap<String, Arc<dyn TaskHandler>>, ExecutorError> {
        let mut resolved = HashMap::with_capacity(plan.task_count());
        for task in plan.tasks() {
            let source = task
                .primary_source()
                .ok_or_else(|| ExecutorError::NoDataSource(task.id.clone()))?;
            let handler = self
                .get(source)
                .ok_or_else(|| ExecutorError::HandlerNotFound {
                    task_id: task.id.clone(),
                    source_id: source.to_string(),
                })?;
            resolved.insert(task.id.clone(), handler.clone());
        }
        for id in plan.batches().iter().flatten() {
            if !resolved.contains_key(id) {
                return Err(ExecutorError::TaskNotFound(id.clone()));
            }
        }
        Ok(resolved)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}
