use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::ExecutorConfig;
use crate::error::ExecutorError;
use crate::planner::{ExecutionPlan, RequestContext};
use crate::safety::SafetyMode;
use crate::task::{Task, TaskPriority, TaskStatus};

use super::registry::HandlerRegistry;
use super::scheduler::execute_batch_parallel;
use super::traits::{
    ExecutionEvent, ExecutionObserver, HandlerContext, ImmediateRetry, RetryStrategy, TaskHandler,
};
use super::types::{ExecutionSummary, TaskRecord};

const HALT_REASON: &str = "skipped: safety pause";

/// Runs an [`ExecutionPlan`]: batches in order, tasks of a batch
/// concurrently, each attempt bounded by the task timeout.
#[derive(Clone)]
pub struct TaskExecutor {
    registry: Arc<HandlerRegistry>,
    config: ExecutorConfig,
    retry_strategy: Arc<dyn RetryStrategy>,
    observers: Vec<Arc<dyn ExecutionObserver>>,
    halt: Option<watch::Receiver<SafetyMode>>,
}

impl TaskExecutor {
    pub fn new(registry: HandlerRegistry, config: ExecutorConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
            retry_strategy: Arc::new(ImmediateRetry),
            observers: Vec::new(),
            halt: None,
        }
    }

    pub fn with_retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = strategy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Tasks that have not started are skipped once the mode turns Paused.
    pub fn with_halt_signal(mut self, mode: watch::Receiver<SafetyMode>) -> Self {
        self.halt = Some(mode);
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        request: &RequestContext,
    ) -> Result<ExecutionSummary, ExecutorError> {
        self.execute_observed(plan, request, None, &[]).await
    }

    /// Execute a supplemental plan. Dependencies completed in `prior` count
    /// as met and their outputs are forwarded to handlers.
    pub async fn execute_with_prior(
        &self,
        plan: &ExecutionPlan,
        request: &RequestContext,
        prior: &ExecutionSummary,
    ) -> Result<ExecutionSummary, ExecutorError> {
        self.execute_observed(plan, request, Some(prior), &[]).await
    }

    /// Like [`TaskExecutor::execute`], with extra observers for this run only.
    pub async fn execute_observed(
        &self,
        plan: &ExecutionPlan,
        request: &RequestContext,
        prior: Option<&ExecutionSummary>,
        extra_observers: &[Arc<dyn ExecutionObserver>],
    ) -> Result<ExecutionSummary, ExecutorError> {
        // Fail before anything runs
        let handlers = self.registry.resolve_plan(plan)?;

        let start = Instant::now();
        let request = Arc::new(request.clone());
        let observers: Vec<Arc<dyn ExecutionObserver>> = self
            .observers
            .iter()
            .chain(extra_observers)
            .cloned()
            .collect();
        let max_parallel = self.config.max_in_flight.min(plan.max_parallel).max(1);

        tracing::info!(
            "executing plan r{} for {}: {} tasks in {} batches (max parallel {})",
            plan.revision,
            plan.symbol,
            plan.task_count(),
            plan.batches().len(),
            max_parallel
        );
        emit(
            &observers,
            &ExecutionEvent::PlanStarted {
                revision: plan.revision,
                total_tasks: plan.task_count(),
                total_batches: plan.batches().len(),
            },
        )
        .await;

        let mut records: BTreeMap<String, TaskRecord> = BTreeMap::new();
        let mut critical_failures: Vec<String> = Vec::new();
        let mut batches_run = 0;
        let mut halted = false;

        for (batch, task_ids) in plan.batches().iter().enumerate() {
            halted = halted || self.is_halted();
            if halted {
                for id in task_ids {
                    let task = lookup(plan, id)?;
                    let record = TaskRecord::skipped(id, task.priority, HALT_REASON);
                    emit(&observers, &ExecutionEvent::TaskFinished { record: record.clone() }).await;
                    records.insert(id.clone(), record);
                }
                continue;
            }

            emit(
                &observers,
                &ExecutionEvent::BatchStarted {
                    batch,
                    task_ids: task_ids.clone(),
                },
            )
            .await;

            let mut ready: Vec<String> = Vec::with_capacity(task_ids.len());
            let mut inputs: HashMap<String, BTreeMap<String, Value>> = HashMap::new();
            for id in task_ids {
                let task = lookup(plan, id)?;
                match dependency_outputs(task, &records, prior) {
                    Ok(outputs) => {
                        inputs.insert(id.clone(), outputs);
                        ready.push(id.clone());
                    }
                    Err(dep) => {
                        tracing::debug!("skipping task '{}': dependency '{}' did not complete", id, dep);
                        let record = TaskRecord::skipped(
                            id,
                            task.priority,
                            format!("skipped: dependency '{dep}' did not complete"),
                        );
                        emit(&observers, &ExecutionEvent::TaskFinished { record: record.clone() })
                            .await;
                        records.insert(id.clone(), record);
                    }
                }
            }

            let handlers = &handlers;
            let inputs = &inputs;
            let observers_ref = observers.as_slice();
            let request_ref = &request;
            let results = execute_batch_parallel(&ready, max_parallel, move |task_id| {
                let task = plan.task(&task_id).cloned();
                let handler = handlers.get(&task_id).cloned();
                let deps = inputs.get(&task_id).cloned().unwrap_or_default();
                let request = Arc::clone(request_ref);
                async move {
                    let task = task.ok_or_else(|| ExecutorError::TaskNotFound(task_id.clone()))?;
                    let handler =
                        handler.ok_or_else(|| ExecutorError::TaskNotFound(task_id.clone()))?;

                    let record = if self.is_halted() {
                        TaskRecord::skipped(&task.id, task.priority, HALT_REASON)
                    } else {
                        self.run_task(task, handler, request, deps, observers_ref)
                            .await?
                    };
                    emit(observers_ref, &ExecutionEvent::TaskFinished { record: record.clone() })
                        .await;
                    Ok(record)
                }
            })
            .await?;

            batches_run += 1;
            for record in results {
                if record.status == TaskStatus::Failed && record.priority == TaskPriority::Critical {
                    tracing::warn!("critical task '{}' failed", record.task_id);
                    critical_failures.push(record.task_id.clone());
                }
                records.insert(record.task_id.clone(), record);
            }

            emit(&observers, &ExecutionEvent::BatchFinished { batch }).await;
        }
        halted = halted || self.is_halted();

        let summary = ExecutionSummary::from_records(
            records,
            critical_failures,
            start.elapsed().as_millis() as u64,
            batches_run,
            halted,
        );

        tracing::info!(
            "plan r{} finished: {} completed, {} failed, {} skipped in {}ms{}",
            plan.revision,
            summary.completed,
            summary.failed,
            summary.skipped,
            summary.duration_ms,
            if summary.halted { " (halted)" } else { "" }
        );
        emit(
            &observers,
            &ExecutionEvent::PlanFinished {
                summary: summary.clone(),
            },
        )
        .await;

        Ok(summary)
    }

    fn is_halted(&self) -> bool {
        self.halt
            .as_ref()
            .is_some_and(|mode| *mode.borrow() == SafetyMode::Paused)
    }

    async fn run_task(
        &self,
        mut task: Task,
        handler: Arc<dyn TaskHandler>,
        request: Arc<RequestContext>,
        dependency_outputs: BTreeMap<String, Value>,
        observers: &[Arc<dyn ExecutionObserver>],
    ) -> Result<TaskRecord, ExecutorError> {
        let mut elapsed = Duration::ZERO;
        let mut output: Option<Value> = None;
        let mut last_error: Option<String> = None;
        let mut timed_out = false;

        loop {
            task.mark_running()?;
            let attempt = task.attempts;
            tracing::debug!(
                "task '{}' attempt {}/{} via '{}'",
                task.id,
                attempt,
                task.max_retries + 1,
                handler.name()
            );
            emit(
                observers,
                &ExecutionEvent::TaskStarted {
                    task_id: task.id.clone(),
                    attempt,
                },
            )
            .await;

            let ctx = HandlerContext {
                task_id: task.id.clone(),
                task_name: task.name.clone(),
                data_sources: task.data_sources.clone(),
                attempt,
                request: request.clone(),
                dependency_outputs: dependency_outputs.clone(),
            };

            let started = Instant::now();
            let result = tokio::time::timeout(task.timeout(), handler.handle(ctx)).await;
            elapsed += started.elapsed();

            let (error, attempt_timed_out) = match result {
                Ok(Ok(value)) => {
                    task.mark_completed()?;
                    output = Some(value);
                    break;
                }
                Ok(Err(e)) => (e.to_string(), false),
                Err(_) => (format!("timed out after {}ms", task.timeout_ms), true),
            };
            timed_out |= attempt_timed_out;
            task.mark_failed()?;

            // A pause keeps the attempt that was in flight and nothing after it
            let delay = if task.remaining_attempts() > 0
                && !self.is_halted()
                && self.retry_strategy.should_retry(attempt, &error)
            {
                self.retry_strategy.next_delay(attempt, &error)
            } else {
                None
            };

            emit(
                observers,
                &ExecutionEvent::TaskAttemptFailed {
                    task_id: task.id.clone(),
                    attempt,
                    error: error.clone(),
                    timed_out: attempt_timed_out,
                    will_retry: delay.is_some(),
                },
            )
            .await;

            match delay {
                Some(delay) => {
                    tracing::warn!(
                        "task '{}' attempt {} failed: {}; retrying in {}ms ({})",
                        task.id,
                        attempt,
                        error,
                        delay.as_millis(),
                        self.retry_strategy.name()
                    );
                    last_error = Some(error);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if self.is_halted() {
                        tracing::debug!("task '{}' not retried: safety pause", task.id);
                        break;
                    }
                    task.requeue()?;
                }
                None => {
                    tracing::warn!(
                        "task '{}' failed after {} attempt(s): {}",
                        task.id,
                        attempt,
                        error
                    );
                    last_error = Some(error);
                    break;
                }
            }
        }

        Ok(TaskRecord {
            task_id: task.id.clone(),
            status: task.status,
            attempts: task.attempts,
            retries_used: task.attempts.saturating_sub(1),
            duration_ms: elapsed.as_millis() as u64,
            output,
            last_error,
            timed_out,
            priority: task.priority,
        })
    }
}

fn lookup<'a>(plan: &'a ExecutionPlan, id: &str) -> Result<&'a Task, ExecutorError> {
    plan.task(id)
        .ok_or_else(|| ExecutorError::TaskNotFound(id.to_string()))
}

/// Outputs of `task`'s dependencies, or the id of the first one that did not
/// complete.
fn dependency_outputs(
    task: &Task,
    records: &BTreeMap<String, TaskRecord>,
    prior: Option<&ExecutionSummary>,
) -> Result<BTreeMap<String, Value>, String> {
    let mut outputs = BTreeMap::new();
    for dep in &task.dependencies {
        let record = records
            .get(dep)
            .or_else(|| prior.and_then(|p| p.record(dep)));
        match record {
            Some(r) if r.is_completed() => {
                outputs.insert(dep.clone(), r.output.clone().unwrap_or(Value::Null));
            }
            _ => return Err(dep.clone()),
        }
    }
    Ok(outputs)
}

async fn emit(observers: &[Arc<dyn ExecutionObserver>], event: &ExecutionEvent) {
    for observer in observers {
        observer.on_event(event).await;
    }
}
