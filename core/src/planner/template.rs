use serde::{Deserialize, Serialize};

use super::context::RequestContext;
use super::profile::{PlanningProfile, RiskProfile};
use crate::task::{Task, TaskPriority};

/// Blueprint the planner instantiates into a [`Task`].
///
/// `name` and `description` may contain `{symbol}`, `{base}` and `{quote}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: TaskPriority,
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub estimated_cost: f64,
    pub estimated_duration_ms: u64,
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub optional: bool,
    /// Empty means every profile.
    #[serde(default)]
    pub profiles: Vec<RiskProfile>,
}

impl TaskTemplate {
    pub fn applies_to(&self, profile: &PlanningProfile) -> bool {
        let risk_ok = self.profiles.is_empty() || self.profiles.contains(&profile.risk);
        risk_ok && (!self.optional || profile.include_optional_tasks)
    }

    pub fn instantiate(&self, ctx: &RequestContext, profile: &PlanningProfile) -> Task {
        let timeout_ms = profile
            .timeout_overrides
            .get(&self.id)
            .copied()
            .unwrap_or(self.timeout_ms);

        Task {
            id: self.id.clone(),
            name: ctx.render(&self.name),
            description: ctx.render(&self.description),
            priority: self.priority,
            data_sources: self.data_sources.clone(),
            dependencies: self.dependencies.clone(),
            estimated_cost: self.estimated_cost,
            estimated_duration_ms: self.estimated_duration_ms,
            timeout_ms,
            max_retries: self.max_retries,
            optional: self.optional,
            status: crate::task::TaskStatus::Pending,
            attempts: 0,
        }
    }
}

/// Source of task templates. Implementations must return templates in a
/// stable order: insertion order breaks batching ties.
pub trait TemplateCatalog: Send + Sync {
    fn name(&self) -> &str;
    fn templates(&self) -> Vec<TaskTemplate>;
}

/// Catalog over a fixed template list.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    templates: Vec<TaskTemplate>,
}

impl StaticCatalog {
    pub fn new(templates: Vec<TaskTemplate>) -> Self {
        Self { templates }
    }
}

impl TemplateCatalog for StaticCatalog {
    fn name(&self) -> &str {
        "static"
    }

    fn templates(&self) -> Vec<TaskTemplate> {
        self.templates.clone()
    }
}
