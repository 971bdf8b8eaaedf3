use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::triggers::TriggerRecord;

/// Violations kept in history, most recent last.
pub const VIOLATION_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyMode {
    #[default]
    Active,
    Paused,
}

impl SafetyMode {
    pub fn is_paused(self) -> bool {
        self == Self::Paused
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub reason: String,
    pub at: DateTime<Utc>,
    /// Resumed by the cooldown rather than an operator
    pub automatic: bool,
}

/// Complete enforcer state. The host persists it through
/// `snapshot()` / `restore()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyState {
    pub mode: SafetyMode,

    /// Trigger that caused the current pause
    pub active_trigger: Option<TriggerRecord>,

    pub paused_at: Option<DateTime<Utc>>,

    pub last_resume: Option<ResumeRecord>,

    pub consecutive_losses: u32,

    /// Timestamps of observed errors inside the rolling window
    pub error_window: VecDeque<DateTime<Utc>>,

    /// Net realized pnl of the current trading day
    pub daily_pnl: f64,

    /// Start of the trading day `daily_pnl` belongs to
    pub day_start: Option<DateTime<Utc>>,

    /// Last observed price deviation, in percent
    pub last_deviation_pct: Option<f64>,

    pub last_sentiment: Option<f64>,

    pub violations: VecDeque<TriggerRecord>,
}

impl SafetyState {
    pub(crate) fn push_violation(&mut self, record: TriggerRecord) {
        if self.violations.len() >= VIOLATION_HISTORY_LIMIT {
            self.violations.pop_front();
        }
        self.violations.push_back(record);
    }

    pub(crate) fn expire_errors(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        while self
            .error_window
            .front()
            .is_some_and(|&at| now.signed_duration_since(at) >= window)
        {
            self.error_window.pop_front();
        }
    }
}

/// Read-only view exposed through the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyStatus {
    pub mode: SafetyMode,
    pub active_trigger: Option<TriggerRecord>,
    pub paused_at: Option<DateTime<Utc>>,
    pub consecutive_losses: u32,
    pub errors_in_window: usize,
    pub daily_pnl: f64,
    pub violation_count: usize,
}

impl From<&SafetyState> for SafetyStatus {
    fn from(state: &SafetyState) -> Self {
        Self {
            mode: state.mode,
            active_trigger: state.active_trigger.clone(),
            paused_at: state.paused_at,
            consecutive_losses: state.consecutive_losses,
            errors_in_window: state.error_window.len(),
            daily_pnl: state.daily_pnl,
            violation_count: state.violations.len(),
        }
    }
}
