use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;

use vigil_core::api::{
    ExecutionPlan, ExecutionSummary, TaskPriority, ValidationInput, ValidationJudgment, Validator,
};

/// Judges research complete when every required data source was served by
/// at least one completed task with a non-empty output.
///
/// Required sources default to those of the Critical tasks across all
/// plans of the run; [`CoverageValidator::with_required_sources`] pins
/// an explicit set instead.
#[derive(Debug, Clone)]
pub struct CoverageValidator {
    required: Option<BTreeSet<String>>,
    /// Share of planned tasks that must complete, 0.0 to 1.0
    min_completion: f64,
}

impl Default for CoverageValidator {
    fn default() -> Self {
        Self {
            required: None,
            min_completion: 0.0,
        }
    }
}

impl CoverageValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_required_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_min_completion(mut self, ratio: f64) -> Self {
        self.min_completion = ratio.clamp(0.0, 1.0);
        self
    }

    fn required_sources(&self, plans: &[ExecutionPlan]) -> BTreeSet<String> {
        if let Some(required) = &self.required {
            return required.clone();
        }
        plans
            .iter()
            .flat_map(|p| p.tasks())
            .filter(|t| t.priority == TaskPriority::Critical)
            .flat_map(|t| t.data_sources.iter().cloned())
            .collect()
    }

    /// Sources served by a completed task with usable output.
    fn covered_sources(plans: &[ExecutionPlan], summary: &ExecutionSummary) -> BTreeSet<String> {
        plans
            .iter()
            .flat_map(|p| p.tasks())
            .filter(|t| {
                summary
                    .record(&t.id)
                    .is_some_and(|r| r.is_completed() && r.output.as_ref().is_some_and(has_data))
            })
            .flat_map(|t| t.data_sources.iter().cloned())
            .collect()
    }
}

fn has_data(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

#[async_trait]
impl Validator for CoverageValidator {
    fn name(&self) -> &str {
        "coverage"
    }

    async fn judge(&self, input: ValidationInput<'_>) -> anyhow::Result<ValidationJudgment> {
        let required = self.required_sources(input.plans);
        let covered = Self::covered_sources(input.plans, input.summary);
        let missing: Vec<String> = required.difference(&covered).cloned().collect();

        let planned: BTreeSet<&str> = input
            .plans
            .iter()
            .flat_map(|p| p.tasks())
            .map(|t| t.id.as_str())
            .collect();
        let completion = if planned.is_empty() {
            1.0
        } else {
            let done = planned
                .iter()
                .filter(|id| input.summary.record(id).is_some_and(|r| r.is_completed()))
                .count();
            done as f64 / planned.len() as f64
        };

        tracing::debug!(
            "coverage for {} (round {}): {}/{} required sources, completion {:.0}%",
            input.request.symbol,
            input.iteration,
            required.len() - missing.len(),
            required.len(),
            completion * 100.0
        );

        if missing.is_empty() && completion >= self.min_completion {
            return Ok(ValidationJudgment::complete());
        }
        Ok(ValidationJudgment::incomplete(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use vigil_core::api::{
        handler_fn, ExecutorConfig, HandlerContext, HandlerError, HandlerRegistry, PlannerConfig,
        PlanningProfile, RequestContext, StaticCatalog, TaskExecutor, TaskPlanner, TaskTemplate,
    };

    fn template(id: &str, priority: TaskPriority, sources: &[&str]) -> TaskTemplate {
        TaskTemplate {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            priority,
            data_sources: sources.iter().map(|s| s.to_string()).collect(),
            dependencies: vec![],
            estimated_cost: 0.01,
            estimated_duration_ms: 10,
            timeout_ms: 1_000,
            max_retries: 0,
            optional: false,
            profiles: vec![],
        }
    }

    async fn judge_with(
        validator: &CoverageValidator,
        registry: HandlerRegistry,
    ) -> ValidationJudgment {
        let request = RequestContext::new("BTC/USDT");
        let planner = TaskPlanner::new(
            Arc::new(StaticCatalog::new(vec![
                template("sentiment", TaskPriority::Critical, &["news", "social"]),
                template("onchain", TaskPriority::Critical, &["onchain"]),
                template("macro", TaskPriority::High, &["macro_data"]),
            ])),
            PlannerConfig::default(),
        );
        let plan = planner.plan(&request, &PlanningProfile::balanced()).unwrap();
        let summary = TaskExecutor::new(registry, ExecutorConfig::default())
            .execute(&plan, &request)
            .await
            .unwrap();
        let plans = vec![plan];

        validator
            .judge(ValidationInput {
                request: &request,
                plans: &plans,
                summary: &summary,
                iteration: 1,
            })
            .await
            .unwrap()
    }

    fn ok() -> Arc<dyn vigil_core::api::TaskHandler> {
        Arc::new(handler_fn("ok", |ctx: HandlerContext| async move {
            Ok(json!({ "task": ctx.task_id }))
        }))
    }

    fn empty() -> Arc<dyn vigil_core::api::TaskHandler> {
        Arc::new(handler_fn("empty", |_ctx: HandlerContext| async move { Ok(json!({})) }))
    }

    fn failing() -> Arc<dyn vigil_core::api::TaskHandler> {
        Arc::new(handler_fn("down", |_ctx: HandlerContext| async move {
            Err(HandlerError::Unavailable("down".into()))
        }))
    }

    #[tokio::test]
    async fn test_full_coverage_is_complete() {
        let registry = HandlerRegistry::new()
            .with_handler("news", ok())
            .with_handler("onchain", ok())
            .with_handler("macro_data", failing());

        let judgment = judge_with(&CoverageValidator::new(), registry).await;

        // macro is not Critical, so its failure does not count
        assert_eq!(judgment, ValidationJudgment::complete());
    }

    #[tokio::test]
    async fn test_failed_critical_task_reports_its_sources() {
        let registry = HandlerRegistry::new()
            .with_handler("news", failing())
            .with_handler("onchain", ok())
            .with_handler("macro_data", ok());

        let judgment = judge_with(&CoverageValidator::new(), registry).await;

        assert!(!judgment.complete);
        assert_eq!(judgment.missing_sources, vec!["news", "social"]);
    }

    #[tokio::test]
    async fn test_empty_output_does_not_cover() {
        let registry = HandlerRegistry::new()
            .with_handler("news", ok())
            .with_handler("onchain", empty())
            .with_handler("macro_data", ok());

        let judgment = judge_with(&CoverageValidator::new(), registry).await;

        assert_eq!(judgment.missing_sources, vec!["onchain"]);
    }

    #[tokio::test]
    async fn test_explicit_sources_and_completion_ratio() {
        let registry = || {
            HandlerRegistry::new()
                .with_handler("news", ok())
                .with_handler("onchain", ok())
                .with_handler("macro_data", failing())
        };

        let pinned = CoverageValidator::new().with_required_sources(["macro_data"]);
        assert_eq!(
            judge_with(&pinned, registry()).await.missing_sources,
            vec!["macro_data"]
        );

        let strict = CoverageValidator::new().with_min_completion(1.0);
        let judgment = judge_with(&strict, registry()).await;
        assert!(!judgment.complete);
        assert!(judgment.missing_sources.is_empty());
    }
}
