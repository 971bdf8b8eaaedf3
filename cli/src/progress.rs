use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use vigil_core::api::{ExecutionEvent, ExecutionObserver, TaskStatus};

/// Progress bars for research execution
///
/// One overall bar per plan and a spinner per running task. Supplemental
/// plans extend the overall bar instead of replacing it.
pub struct ProgressObserver {
    enabled: bool,
    inner: Mutex<Bars>,
}

struct Bars {
    multi: MultiProgress,
    overall: ProgressBar,
    task_bars: HashMap<String, ProgressBar>,
}

impl ProgressObserver {
    /// `enabled` is false for JSON output or without a terminal.
    pub fn new(enabled: bool) -> Self {
        let multi = MultiProgress::new();
        let overall = if enabled {
            let bar = multi.add(ProgressBar::new(0));
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓▒░  "),
            );
            bar.set_message("Planning...");
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            enabled,
            inner: Mutex::new(Bars {
                multi,
                overall,
                task_bars: HashMap::new(),
            }),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("  {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }
}

#[async_trait]
impl ExecutionObserver for ProgressObserver {
    fn name(&self) -> &str {
        "progress"
    }

    async fn on_event(&self, event: &ExecutionEvent) {
        if !self.enabled {
            return;
        }
        let Ok(mut bars) = self.inner.lock() else {
            return;
        };

        match event {
            ExecutionEvent::PlanStarted {
                revision,
                total_tasks,
                ..
            } => {
                bars.overall.inc_length(*total_tasks as u64);
                bars.overall.set_message(format!("Revision {revision}"));
            }
            ExecutionEvent::BatchStarted { batch, task_ids } => {
                bars.overall
                    .set_message(format!("Batch {} ({} tasks)", batch + 1, task_ids.len()));
            }
            ExecutionEvent::TaskStarted { task_id, attempt } => {
                let label = if *attempt > 1 {
                    format!("⏳ {task_id} (attempt {attempt})")
                } else {
                    format!("⏳ {task_id}")
                };
                if let Some(bar) = bars.task_bars.get(task_id) {
                    bar.set_message(label);
                    return;
                }
                let bar = bars.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::spinner_style());
                bar.set_message(label);
                bar.enable_steady_tick(Duration::from_millis(100));
                bars.task_bars.insert(task_id.clone(), bar);
            }
            ExecutionEvent::TaskAttemptFailed { .. } | ExecutionEvent::BatchFinished { .. } => {}
            ExecutionEvent::TaskFinished { record } => {
                let icon = match record.status {
                    TaskStatus::Completed => "✅",
                    TaskStatus::Skipped => "⏭",
                    _ => "❌",
                };
                let msg = format!("{} {} ({}ms)", icon, record.task_id, record.duration_ms);
                match bars.task_bars.remove(&record.task_id) {
                    Some(bar) => bar.finish_with_message(msg),
                    None => {
                        // Skipped tasks never got a spinner
                        let _ = bars.multi.println(format!("  {msg}"));
                    }
                }
                bars.overall.inc(1);
            }
            ExecutionEvent::PlanFinished { summary } => {
                let msg = if summary.halted {
                    "⛔ Halted by safety pause".to_string()
                } else {
                    format!(
                        "{} completed, {} failed, {} skipped",
                        summary.completed, summary.failed, summary.skipped
                    )
                };
                bars.overall.set_message(msg);
            }
        }
    }
}

impl Drop for ProgressObserver {
    fn drop(&mut self) {
        if let Ok(bars) = self.inner.get_mut() {
            for (_, bar) in bars.task_bars.drain() {
                bar.finish_and_clear();
            }
            bars.overall.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::api::ExecutionSummary;

    #[tokio::test]
    async fn test_disabled_observer_ignores_events() {
        let observer = ProgressObserver::new(false);
        observer
            .on_event(&ExecutionEvent::TaskStarted {
                task_id: "task_macro".into(),
                attempt: 1,
            })
            .await;
        observer
            .on_event(&ExecutionEvent::PlanFinished {
                summary: ExecutionSummary::default(),
            })
            .await;

        assert!(observer.inner.lock().unwrap().task_bars.is_empty());
    }
}
