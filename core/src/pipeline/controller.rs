use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::stages::{
    Decision, DecisionInput, DecisionMaker, EvaluationStage, ValidationInput, Validator,
};
use super::state::{PipelineRun, PipelineStage};
use super::status::{StatusBoard, StatusSnapshot};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::executor::{ExecutionEvent, ExecutionObserver, ExecutionSummary, TaskExecutor};
use crate::optimizer::{FallbackSelector, OptimizationResult};
use crate::planner::{ExecutionPlan, PlanningProfile, RequestContext, TaskPlanner};
use crate::safety::{SafetyEnforcer, SafetySignal, TriggerRecord};

/// Successful end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub run_id: String,
    pub symbol: String,
    pub decision: Decision,
    /// Validation never passed; confidence is reduced
    pub degraded: bool,
    pub missing_sources: Vec<String>,
    pub iterations: u32,
    pub revision: u32,
    pub summary: ExecutionSummary,
    pub optimization: Option<OptimizationResult>,
}

/// A run stopped by the safety enforcer. No decision was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltReport {
    pub run_id: String,
    pub symbol: String,
    /// Stage the run was in when the pause was observed
    pub halted_at: PipelineStage,
    /// Trigger and measurement behind the pause
    pub trigger: Option<TriggerRecord>,
    /// Research gathered before the halt
    pub summary: ExecutionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Done(DecisionReport),
    Halted(HaltReport),
}

impl PipelineOutcome {
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted(_))
    }

    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Self::Done(report) => Some(&report.decision),
            Self::Halted(_) => None,
        }
    }
}

/// Forwards failed task attempts to the safety enforcer.
struct TaskErrorReporter {
    safety: SafetyEnforcer,
}

#[async_trait]
impl ExecutionObserver for TaskErrorReporter {
    fn name(&self) -> &str {
        "safety-error-reporter"
    }

    async fn on_event(&self, event: &ExecutionEvent) {
        if let ExecutionEvent::TaskAttemptFailed { task_id, error, .. } = event {
            self.safety
                .record(SafetySignal::error(task_id.clone(), error.clone()))
                .await;
        }
    }
}

/// Drives one request through
/// `Planning → Researching → Validating → Evaluating → Deciding → Done`,
/// with a bounded research loop and a safety gate at every stage boundary.
pub struct PipelineController {
    planner: TaskPlanner,
    executor: TaskExecutor,
    validator: Arc<dyn Validator>,
    stages: Vec<Arc<dyn EvaluationStage>>,
    decision_maker: Arc<dyn DecisionMaker>,
    optimizer: Option<FallbackSelector>,
    safety: SafetyEnforcer,
    config: PipelineConfig,
    status: StatusBoard,
}

impl PipelineController {
    pub fn new(
        planner: TaskPlanner,
        executor: TaskExecutor,
        validator: Arc<dyn Validator>,
        decision_maker: Arc<dyn DecisionMaker>,
        safety: SafetyEnforcer,
        config: PipelineConfig,
    ) -> Self {
        let executor = executor.with_halt_signal(safety.subscribe_mode());
        Self {
            planner,
            executor,
            validator,
            stages: Vec::new(),
            decision_maker,
            optimizer: None,
            safety,
            config,
            status: StatusBoard::new(),
        }
    }

    pub fn with_stage(mut self, stage: Arc<dyn EvaluationStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_optimizer(mut self, optimizer: FallbackSelector) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn safety(&self) -> &SafetyEnforcer {
        &self.safety
    }

    pub fn status_board(&self) -> &StatusBoard {
        &self.status
    }

    pub async fn current_status(&self) -> StatusSnapshot {
        self.status.snapshot(self.safety.status().await).await
    }

    /// Run the pipeline for one request.
    ///
    /// A safety pause is a regular [`PipelineOutcome::Halted`]; `Err` is
    /// reserved for planning errors, executor faults and collaborator
    /// failures.
    pub async fn run(
        &self,
        request: RequestContext,
        profile: &PlanningProfile,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut run = PipelineRun::new(request.symbol.clone());
        let mut summary = ExecutionSummary::default();
        let max_iterations = self.config.max_iterations.max(1);
        tracing::info!(
            "pipeline run {} started for {} ({} profile)",
            run.run_id,
            run.symbol,
            profile.risk
        );
        self.status.publish_run(&run).await;

        if let Some(halt) = self.halt_if_paused(&mut run, &summary).await? {
            return Ok(halt);
        }
        let plan = self.planner.plan(&request, profile)?;
        self.status.publish_plan(plan.summary()).await;
        let mut plans: Vec<ExecutionPlan> = vec![plan];

        let observers: Vec<Arc<dyn ExecutionObserver>> = if self.config.report_task_errors {
            vec![Arc::new(TaskErrorReporter {
                safety: self.safety.clone(),
            })]
        } else {
            Vec::new()
        };

        loop {
            if let Some(halt) = self.halt_if_paused(&mut run, &summary).await? {
                return Ok(halt);
            }
            self.enter(&mut run, PipelineStage::Researching).await?;

            let Some(plan) = plans.last() else {
                return Err(PipelineError::stage("researching", "no plan to execute"));
            };
            let round = self
                .executor
                .execute_observed(plan, &request, Some(&summary), &observers)
                .await?;
            summary = summary.merge(&round);
            run.complete_round();
            self.status.publish_run(&run).await;

            if let Some(halt) = self.halt_if_paused(&mut run, &summary).await? {
                return Ok(halt);
            }
            self.enter(&mut run, PipelineStage::Validating).await?;

            let judgment = self
                .validator
                .judge(ValidationInput {
                    request: &request,
                    plans: &plans,
                    summary: &summary,
                    iteration: run.iteration,
                })
                .await
                .map_err(|e| PipelineError::stage("validating", format!("{:#}", e)))?;

            if judgment.complete {
                break;
            }

            if run.iteration >= max_iterations {
                tracing::warn!(
                    "research still incomplete after {} round(s), proceeding degraded; missing: {}",
                    run.iteration,
                    judgment.missing_sources.join(", ")
                );
                run.mark_degraded(judgment.missing_sources);
                break;
            }

            let satisfied: HashSet<String> = summary.completed_ids().map(String::from).collect();
            let supplemental = self.planner.plan_supplemental(
                &request,
                profile,
                &judgment.missing_sources,
                &satisfied,
                run.revision + 1,
            )?;
            if supplemental.is_empty() {
                tracing::warn!(
                    "no task can fill missing sources ({}), proceeding degraded",
                    judgment.missing_sources.join(", ")
                );
                run.mark_degraded(judgment.missing_sources);
                break;
            }

            tracing::info!(
                "research round {} incomplete, re-planning {} task(s)",
                run.iteration,
                supplemental.task_count()
            );
            self.status.publish_plan(supplemental.summary()).await;
            plans.push(supplemental);
        }

        if let Some(halt) = self.halt_if_paused(&mut run, &summary).await? {
            return Ok(halt);
        }
        self.enter(&mut run, PipelineStage::Evaluating).await?;

        let mut evaluation = research_payload(&run, &summary);
        for stage in &self.stages {
            evaluation = stage
                .evaluate(evaluation)
                .await
                .map_err(|e| PipelineError::stage(stage.name(), format!("{:#}", e)))?;
        }
        let optimization = match &self.optimizer {
            Some(optimizer) => Some(optimizer.run(&evaluation).await?),
            None => None,
        };

        // Deciding gate
        if let Some(halt) = self.halt_if_paused(&mut run, &summary).await? {
            return Ok(halt);
        }
        self.enter(&mut run, PipelineStage::Deciding).await?;

        let input = DecisionInput {
            symbol: run.symbol.clone(),
            evaluation,
            optimization: optimization.clone(),
            degraded: run.degraded,
            missing_sources: run.missing_sources.clone(),
        };
        let decision = self
            .decision_maker
            .decide(&input)
            .await
            .map_err(|e| PipelineError::stage("deciding", format!("{:#}", e)))?;

        self.enter(&mut run, PipelineStage::Done).await?;
        tracing::info!(
            "pipeline run {} done: {} (confidence {:.2}{})",
            run.run_id,
            decision.action,
            decision.confidence,
            if run.degraded { ", degraded" } else { "" }
        );

        Ok(PipelineOutcome::Done(DecisionReport {
            run_id: run.run_id.clone(),
            symbol: run.symbol.clone(),
            decision,
            degraded: run.degraded,
            missing_sources: run.missing_sources.clone(),
            iterations: run.iteration,
            revision: run.revision,
            summary,
            optimization,
        }))
    }

    async fn enter(&self, run: &mut PipelineRun, stage: PipelineStage) -> Result<(), PipelineError> {
        run.advance(stage)?;
        tracing::debug!("run {} -> {} (revision {})", run.run_id, stage, run.revision);
        self.status.publish_run(run).await;
        Ok(())
    }

    async fn halt_if_paused(
        &self,
        run: &mut PipelineRun,
        summary: &ExecutionSummary,
    ) -> Result<Option<PipelineOutcome>, PipelineError> {
        if !self.safety.is_paused() {
            return Ok(None);
        }
        if self.safety.poll_auto_resume().await {
            tracing::info!(
                "pipeline run {} continues during {}: pause cooldown elapsed",
                run.run_id,
                run.stage
            );
            return Ok(None);
        }

        let halted_at = run.stage;
        self.enter(run, PipelineStage::Halted).await?;
        let trigger = self.safety.status().await.active_trigger;
        tracing::error!(
            "pipeline run {} halted during {}: {}",
            run.run_id,
            halted_at,
            trigger
                .as_ref()
                .map_or("safety pause", |t| t.message.as_str())
        );

        Ok(Some(PipelineOutcome::Halted(HaltReport {
            run_id: run.run_id.clone(),
            symbol: run.symbol.clone(),
            halted_at,
            trigger,
            summary: summary.clone(),
        })))
    }
}

/// Input of the first evaluation stage.
fn research_payload(run: &PipelineRun, summary: &ExecutionSummary) -> Value {
    let research: BTreeMap<&str, &Value> = summary
        .records
        .iter()
        .filter(|(_, r)| r.is_completed())
        .filter_map(|(id, r)| r.output.as_ref().map(|o| (id.as_str(), o)))
        .collect();

    json!({
        "symbol": run.symbol,
        "revision": run.revision,
        "degraded": run.degraded,
        "missing_sources": run.missing_sources,
        "critical_failures": summary.critical_failures,
        "stats": {
            "completed": summary.completed,
            "failed": summary.failed,
            "skipped": summary.skipped,
            "success_ratio": summary.success_ratio(),
        },
        "research": research,
    })
}
