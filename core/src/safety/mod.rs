//! Safety enforcer: pauses decision-making when risk thresholds are crossed.
//!
//! Active → Paused the instant a trigger crosses; Paused → Active only via
//! `resume(reason)` or the auto-resume cooldown.

mod enforcer;
mod signals;
mod state;
mod triggers;

pub use enforcer::{SafetyEnforcer, SafetyEvent};
pub use signals::SafetySignal;
pub use state::{
    ResumeRecord, SafetyMode, SafetyState, SafetyStatus, VIOLATION_HISTORY_LIMIT,
};
pub use triggers::{trading_day_start, TriggerKind, TriggerRecord};
