use std::sync::Arc;

use anyhow::Result;

use vigil_core::api::{
    AppConfig, ExecutionObserver, FallbackSelector, HandlerRegistry, ImmediateRetry,
    OptimizationStrategy, PipelineController, RetryConfig, RetryStrategy, SafetyEnforcer,
    SafetyState, TaskExecutor, TaskPlanner,
};

use crate::catalog::{standard_primary_sources, StandardResearchCatalog};
use crate::handlers::{register_placeholders, DEFAULT_PLACEHOLDER_DELAY};
use crate::strategies::{
    EqualWeightOptimizer, ExponentialBackoffRetry, LinearBackoffRetry, MeanVarianceOptimizer,
    ResearchScoreStage, ThresholdDecisionMaker,
};
use crate::validation::CoverageValidator;

pub fn build_planner(cfg: &AppConfig) -> TaskPlanner {
    TaskPlanner::new(Arc::new(StandardResearchCatalog), cfg.planner.clone())
}

pub fn build_retry_strategy(cfg: &RetryConfig) -> Result<Arc<dyn RetryStrategy>> {
    match cfg.strategy.as_str() {
        "immediate" => Ok(Arc::new(ImmediateRetry)),
        "linear" => Ok(Arc::new(LinearBackoffRetry::new(cfg.clone()))),
        "exponential-backoff" => Ok(Arc::new(ExponentialBackoffRetry::new(cfg.clone()))),
        other => anyhow::bail!("unknown retry strategy: {other}"),
    }
}

/// Registry with a placeholder for every standard source not already in
/// `registry`.
pub fn build_registry(mut registry: HandlerRegistry) -> HandlerRegistry {
    register_placeholders(
        &mut registry,
        standard_primary_sources(),
        DEFAULT_PLACEHOLDER_DELAY,
    );
    registry
}

pub fn build_executor(cfg: &AppConfig, registry: HandlerRegistry) -> Result<TaskExecutor> {
    let retry = build_retry_strategy(&cfg.executor.retry)?;
    Ok(TaskExecutor::new(registry, cfg.executor.clone()).with_retry_strategy(retry))
}

pub fn build_safety(cfg: &AppConfig, restored: Option<SafetyState>) -> SafetyEnforcer {
    match restored {
        Some(state) => SafetyEnforcer::with_state(cfg.safety.clone(), state),
        None => SafetyEnforcer::new(cfg.safety.clone()),
    }
}

/// Equal weights as the fallback. With `optimizer.primary_enabled`, `primary`
/// (or the mean-variance optimizer when `None`) runs first.
pub fn build_optimizer(
    cfg: &AppConfig,
    primary: Option<Arc<dyn OptimizationStrategy>>,
) -> FallbackSelector {
    let selector = FallbackSelector::new(Arc::new(EqualWeightOptimizer), cfg.optimizer.clone());
    if !cfg.optimizer.primary_enabled {
        return selector;
    }
    let primary = primary.unwrap_or_else(|| Arc::new(MeanVarianceOptimizer::default()));
    tracing::debug!(
        "primary optimizer '{}' enabled ({}ms budget)",
        primary.name(),
        cfg.optimizer.primary_timeout_ms
    );
    selector.with_primary(primary)
}

/// Standard controller: standard catalog, placeholder handlers for any
/// source `registry` leaves uncovered, coverage validation, research
/// scoring, optimizer selection and threshold decisions.
pub fn build_controller(
    cfg: &AppConfig,
    registry: HandlerRegistry,
    safety: SafetyEnforcer,
) -> Result<PipelineController> {
    build_controller_with_observers(cfg, registry, safety, Vec::new(), None)
}

pub fn build_controller_with_observers(
    cfg: &AppConfig,
    registry: HandlerRegistry,
    safety: SafetyEnforcer,
    observers: Vec<Arc<dyn ExecutionObserver>>,
    primary_optimizer: Option<Arc<dyn OptimizationStrategy>>,
) -> Result<PipelineController> {
    let executor = observers.into_iter().fold(
        build_executor(cfg, build_registry(registry))?,
        TaskExecutor::with_observer,
    );
    Ok(PipelineController::new(
        build_planner(cfg),
        executor,
        Arc::new(CoverageValidator::new()),
        Arc::new(ThresholdDecisionMaker::default()),
        safety,
        cfg.pipeline.clone(),
    )
    .with_stage(Arc::new(ResearchScoreStage))
    .with_optimizer(build_optimizer(cfg, primary_optimizer)))
}
