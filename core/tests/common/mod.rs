#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use vigil_core::api::{
    handler_fn, Decision, DecisionAction, DecisionInput, DecisionMaker, ExecutionEvent,
    ExecutionObserver, HandlerContext, HandlerError, StaticCatalog, TaskHandler, TaskPriority,
    TaskTemplate, ValidationInput, ValidationJudgment, Validator,
};

pub fn template(
    id: &str,
    priority: TaskPriority,
    sources: &[&str],
    deps: &[&str],
) -> TaskTemplate {
    TaskTemplate {
        id: id.to_string(),
        name: format!("{id} for {{symbol}}"),
        description: String::new(),
        priority,
        data_sources: sources.iter().map(|s| s.to_string()).collect(),
        dependencies: deps.iter().map(|s| s.to_string()).collect(),
        estimated_cost: 0.01,
        estimated_duration_ms: 10,
        timeout_ms: 1_000,
        max_retries: 0,
        optional: false,
        profiles: vec![],
    }
}

pub fn catalog(templates: Vec<TaskTemplate>) -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::new(templates))
}

/// Sleeps `ms`, then returns the task id and the ids of the dependency
/// outputs it received.
pub fn sleeping(ms: u64) -> Arc<dyn TaskHandler> {
    Arc::new(handler_fn("sleeping", move |ctx: HandlerContext| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        let deps: Vec<&String> = ctx.dependency_outputs.keys().collect();
        Ok(json!({ "task": ctx.task_id, "deps": deps }))
    }))
}

pub fn instant() -> Arc<dyn TaskHandler> {
    sleeping(0)
}

/// Never finishes within any sane timeout.
pub fn hanging() -> Arc<dyn TaskHandler> {
    sleeping(3_600_000)
}

/// Counts calls and fails the first `failures` of them.
pub struct Flaky {
    pub calls: AtomicU32,
    failures: u32,
}

impl Flaky {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failures,
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::new(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn handle(&self, ctx: HandlerContext) -> Result<Value, HandlerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(HandlerError::Unavailable(format!("{} unreachable", ctx.data_sources[0])))
        } else {
            Ok(json!({ "task": ctx.task_id }))
        }
    }
}

/// Incomplete while any Critical task of any plan has not completed; the
/// missing sources are those tasks' sources.
pub struct CriticalCoverage;

#[async_trait]
impl Validator for CriticalCoverage {
    fn name(&self) -> &str {
        "critical-coverage"
    }

    async fn judge(&self, input: ValidationInput<'_>) -> anyhow::Result<ValidationJudgment> {
        let missing: BTreeSet<&str> = input
            .plans
            .iter()
            .flat_map(|p| p.tasks())
            .filter(|t| t.priority == TaskPriority::Critical)
            .filter(|t| !input.summary.record(&t.id).is_some_and(|r| r.is_completed()))
            .flat_map(|t| t.data_sources.iter().map(String::as_str))
            .collect();

        Ok(if missing.is_empty() {
            ValidationJudgment::complete()
        } else {
            ValidationJudgment::incomplete(missing)
        })
    }
}

/// Always reports the same missing sources.
pub struct NeverComplete(pub Vec<String>);

#[async_trait]
impl Validator for NeverComplete {
    fn name(&self) -> &str {
        "never-complete"
    }

    async fn judge(&self, _input: ValidationInput<'_>) -> anyhow::Result<ValidationJudgment> {
        Ok(ValidationJudgment::incomplete(self.0.clone()))
    }
}

/// Acts with full confidence unless degraded.
#[derive(Default)]
pub struct RecordingDecisionMaker {
    pub inputs: Mutex<Vec<DecisionInput>>,
}

#[async_trait]
impl DecisionMaker for RecordingDecisionMaker {
    fn name(&self) -> &str {
        "recording"
    }

    async fn decide(&self, input: &DecisionInput) -> anyhow::Result<Decision> {
        self.inputs
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(input.clone());
        Ok(Decision {
            action: if input.degraded {
                DecisionAction::NoAction
            } else {
                DecisionAction::Act
            },
            confidence: if input.degraded { 0.3 } else { 0.9 },
            rationale: "test".into(),
            details: Value::Null,
        })
    }
}

/// Records batch starts and task attempts as strings.
#[derive(Default)]
pub struct EventLog(pub Mutex<Vec<String>>);

impl EventLog {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionObserver for EventLog {
    fn name(&self) -> &str {
        "event-log"
    }

    async fn on_event(&self, event: &ExecutionEvent) {
        let line = match event {
            ExecutionEvent::BatchStarted { batch, task_ids } => {
                format!("batch {batch}: {}", task_ids.join(","))
            }
            ExecutionEvent::TaskStarted { task_id, attempt } => {
                format!("start {task_id}#{attempt}")
            }
            _ => return,
        };
        if let Ok(mut lines) = self.0.lock() {
            lines.push(line);
        }
    }
}
