mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::Instant;

use common::{catalog, hanging, instant, sleeping, template, EventLog};
use vigil_core::api::{
    handler_fn, ExecutorConfig, HandlerContext, HandlerRegistry, PlannerConfig, PlanningProfile,
    RequestContext, SafetyConfig, SafetyEnforcer, SafetySignal, TaskExecutor, TaskPlanner,
    TaskPriority, TaskStatus,
};

fn request() -> RequestContext {
    RequestContext::new("BTC/USDT")
}

#[tokio::test]
async fn test_six_task_graph_runs_in_three_batches() {
    let p = TaskPriority::High;
    let planner = TaskPlanner::new(
        catalog(vec![
            template("A", p, &["fast"], &[]),
            template("B", p, &["fast"], &[]),
            template("C", p, &["fast"], &[]),
            template("D", p, &["fast"], &["A", "B"]),
            template("E", p, &["fast"], &["C"]),
            template("F", p, &["fast"], &["D", "E"]),
        ]),
        PlannerConfig::default(),
    );
    let plan = planner
        .plan(&request(), &PlanningProfile::balanced())
        .unwrap();
    assert_eq!(
        plan.batches(),
        &[
            vec!["A".to_string(), "B".into(), "C".into()],
            vec!["D".to_string(), "E".into()],
            vec!["F".to_string()],
        ]
    );

    let log = Arc::new(EventLog::default());
    let executor = TaskExecutor::new(
        HandlerRegistry::new().with_handler("fast", instant()),
        ExecutorConfig::default(),
    )
    .with_observer(log.clone());
    let summary = executor.execute(&plan, &request()).await.unwrap();

    assert_eq!(summary.completed, 6);
    assert_eq!(summary.batches_run, 3);
    assert_eq!(summary.output("F").unwrap()["deps"], json!(["D", "E"]));

    // Every task of a batch starts before any task of the next one
    let lines = log.lines();
    let position = |needle: &str| lines.iter().position(|l| l == needle).unwrap();
    assert!(position("start C#1") < position("batch 1: D,E"));
    assert!(position("start E#1") < position("batch 2: F"));
}

#[tokio::test(start_paused = true)]
async fn test_batch_respects_concurrency_bound() {
    let p = TaskPriority::Medium;
    let planner = TaskPlanner::new(
        catalog(vec![
            template("x", p, &["slow"], &[]),
            template("y", p, &["slow"], &[]),
            template("z", p, &["slow"], &[]),
        ]),
        PlannerConfig::default(),
    );
    let plan = planner
        .plan(&request(), &PlanningProfile::balanced().with_max_parallel(2))
        .unwrap();
    let executor = TaskExecutor::new(
        HandlerRegistry::new().with_handler("slow", sleeping(10)),
        ExecutorConfig::default(),
    );

    let start = Instant::now();
    let summary = executor.execute(&plan, &request()).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.completed, 3);
    assert!(elapsed >= Duration::from_millis(20), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(30), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_exhaust_retries_without_blocking_siblings() {
    let mut stuck = template("stuck", TaskPriority::Critical, &["hangs"], &[]);
    stuck.timeout_ms = 50;
    stuck.max_retries = 2;
    let planner = TaskPlanner::new(
        catalog(vec![stuck, template("fine", TaskPriority::High, &["fast"], &[])]),
        PlannerConfig::default(),
    );
    let plan = planner
        .plan(&request(), &PlanningProfile::balanced())
        .unwrap();
    let executor = TaskExecutor::new(
        HandlerRegistry::new()
            .with_handler("hangs", hanging())
            .with_handler("fast", instant()),
        ExecutorConfig::default(),
    );

    let summary = executor.execute(&plan, &request()).await.unwrap();

    let stuck = summary.record("stuck").unwrap();
    assert_eq!(stuck.status, TaskStatus::Failed);
    assert_eq!(stuck.attempts, 3);
    assert_eq!(stuck.retries_used, 2);
    assert!(stuck.timed_out);
    assert_eq!(stuck.last_error.as_deref(), Some("timed out after 50ms"));
    assert_eq!(summary.critical_failures, vec!["stuck".to_string()]);

    assert!(summary.record("fine").unwrap().is_completed());
}

#[tokio::test]
async fn test_safety_pause_mid_run_skips_remaining_batches() {
    let safety = SafetyEnforcer::new(SafetyConfig::default());
    let tripwire = {
        let safety = safety.clone();
        Arc::new(handler_fn("tripwire", move |ctx: HandlerContext| {
            let safety = safety.clone();
            async move {
                safety.record(SafetySignal::outcome(-50.0)).await;
                Ok(json!({ "task": ctx.task_id }))
            }
        }))
    };

    let p = TaskPriority::High;
    let planner = TaskPlanner::new(
        catalog(vec![
            template("first", p, &["trip"], &[]),
            template("second", p, &["fast"], &["first"]),
            template("third", p, &["fast"], &["second"]),
        ]),
        PlannerConfig::default(),
    );
    let plan = planner
        .plan(&request(), &PlanningProfile::balanced())
        .unwrap();
    let executor = TaskExecutor::new(
        HandlerRegistry::new()
            .with_handler("trip", tripwire)
            .with_handler("fast", instant()),
        ExecutorConfig::default(),
    )
    .with_halt_signal(safety.subscribe_mode());

    let summary = executor.execute(&plan, &request()).await.unwrap();

    assert!(safety.is_paused());
    assert!(summary.halted);
    assert_eq!(summary.batches_run, 1);
    assert!(summary.record("first").unwrap().is_completed());
    for id in ["second", "third"] {
        let record = summary.record(id).unwrap();
        assert_eq!(record.status, TaskStatus::Skipped);
        assert_eq!(record.attempts, 0);
        assert_eq!(record.last_error.as_deref(), Some("skipped: safety pause"));
    }
}
