pub mod cli;

use std::sync::Arc;

use anyhow::Result;
use vigil_core::api::{
    AppConfig, ExecutionObserver, HandlerRegistry, PipelineOutcome, PlanningProfile,
    RequestContext, SafetyEnforcer, SafetyEvent, SafetySignal,
};
use vigil_plugins::factory;

use crate::progress::ProgressObserver;
use crate::state_file;
use cli::{OutputFormat, PlanArgs, PlanTarget, RunArgs, SafetyArgs};

/// Exit code of a run the safety enforcer halted.
pub const HALTED_EXIT: i32 = 70;

fn profile_for(cfg: &AppConfig, target: &PlanTarget) -> PlanningProfile {
    let risk = target
        .profile
        .map(Into::into)
        .unwrap_or(cfg.planner.default_profile);
    let mut profile = PlanningProfile::for_risk(risk).with_optional_tasks(!target.no_optional);
    if let Some(cap) = target.budget_cap {
        profile = profile.with_budget_cap(cap);
    }
    if let Some(n) = target.max_parallel {
        profile = profile.with_max_parallel(n);
    }
    profile
}

pub fn plan(cfg: &AppConfig, args: PlanArgs, format: OutputFormat) -> Result<i32> {
    let planner = factory::build_planner(cfg);
    let profile = profile_for(cfg, &args.target);
    let plan = planner.plan(&RequestContext::new(&args.target.symbol), &profile)?;

    match format {
        OutputFormat::Text => println!("{plan}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(0)
}

pub async fn run(cfg: &AppConfig, args: RunArgs, format: OutputFormat) -> Result<i32> {
    let restored = match &args.state {
        Some(path) => state_file::load(path)?,
        None => None,
    };
    let safety = factory::build_safety(cfg, restored);
    spawn_safety_log(&safety);

    for pnl in &args.outcomes {
        safety.record(SafetySignal::outcome(*pnl)).await;
    }
    if let Some(dev) = &args.deviation {
        let (expected, actual) = cli::parse_deviation(dev)?;
        safety.record(SafetySignal::deviation(expected, actual)).await;
    }
    if let Some(score) = args.sentiment {
        safety.record(SafetySignal::sentiment(score)).await;
    }

    let show_progress =
        !args.no_progress && format == OutputFormat::Text && atty::is(atty::Stream::Stderr);
    let progress: Arc<dyn ExecutionObserver> = Arc::new(ProgressObserver::new(show_progress));
    let controller = factory::build_controller_with_observers(
        cfg,
        HandlerRegistry::new(),
        safety.clone(),
        vec![progress],
        None,
    )?;

    let profile = profile_for(cfg, &args.target);
    let outcome = controller
        .run(RequestContext::new(&args.target.symbol), &profile)
        .await;

    // Persist whatever the run did to the counters, even on error
    if let Some(path) = &args.state {
        state_file::save(path, &safety.snapshot().await)?;
    }
    let outcome = outcome?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => print_outcome(&outcome),
    }

    Ok(if outcome.is_halted() { HALTED_EXIT } else { 0 })
}

pub async fn safety(cfg: &AppConfig, args: SafetyArgs, format: OutputFormat) -> Result<i32> {
    let safety = factory::build_safety(cfg, state_file::load(&args.state)?);

    if let Some(reason) = args.resume {
        if args.force {
            safety.force_resume(reason).await?;
        } else {
            safety.resume(reason).await?;
        }
        state_file::save(&args.state, &safety.snapshot().await)?;
    }

    let status = safety.status().await;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => {
            println!("mode: {:?}", status.mode);
            if let Some(trigger) = &status.active_trigger {
                println!("trigger: {} ({})", trigger.kind, trigger.message);
            }
            println!("consecutive losses: {}", status.consecutive_losses);
            println!("errors in window: {}", status.errors_in_window);
            println!("daily pnl: {:.2}", status.daily_pnl);
            println!("violations recorded: {}", status.violation_count);
        }
    }
    Ok(if status.mode.is_paused() { HALTED_EXIT } else { 0 })
}

fn spawn_safety_log(safety: &SafetyEnforcer) {
    let mut events = safety.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SafetyEvent::Paused { trigger } => {
                    tracing::debug!("safety paused by {}", trigger.kind);
                }
                SafetyEvent::ViolationRecorded { trigger } => {
                    tracing::debug!("further violation while paused: {}", trigger.message);
                }
                SafetyEvent::Resumed { record } => {
                    tracing::debug!("safety resumed: {}", record.reason);
                }
            }
        }
    });
}

fn print_outcome(outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Done(report) => {
            println!(
                "{}: {} (confidence {:.2})",
                report.symbol, report.decision.action, report.decision.confidence
            );
            println!("  {}", report.decision.rationale);
            println!(
                "  research: {} completed, {} failed, {} skipped over {} round(s)",
                report.summary.completed,
                report.summary.failed,
                report.summary.skipped,
                report.iterations
            );
            if report.degraded {
                println!("  degraded, missing: {}", report.missing_sources.join(", "));
            }
        }
        PipelineOutcome::Halted(halt) => {
            println!("{}: halted during {}", halt.symbol, halt.halted_at);
            if let Some(trigger) = &halt.trigger {
                println!(
                    "  {} ({:.2} vs threshold {:.2}): {}",
                    trigger.kind, trigger.measurement, trigger.threshold, trigger.message
                );
            }
            println!("  resume with: vigil safety --state <file> --resume <reason>");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::api::RiskProfile;

    fn target() -> PlanTarget {
        PlanTarget {
            symbol: "BTC/USDT".into(),
            profile: None,
            budget_cap: Some(0.1),
            max_parallel: None,
            no_optional: true,
        }
    }

    #[test]
    fn test_profile_defaults_to_config() {
        let mut cfg = AppConfig::default();
        cfg.planner.default_profile = RiskProfile::Conservative;

        let profile = profile_for(&cfg, &target());

        assert_eq!(profile.risk, RiskProfile::Conservative);
        assert_eq!(profile.budget_cap, Some(0.1));
        assert!(!profile.include_optional_tasks);
    }
}
