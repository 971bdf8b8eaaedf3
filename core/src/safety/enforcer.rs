use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Mutex};

use super::signals::SafetySignal;
use super::state::{ResumeRecord, SafetyMode, SafetyState, SafetyStatus};
use super::triggers::{apply_signal, TriggerRecord};
use crate::config::SafetyConfig;
use crate::error::SafetyError;

const AUTO_RESUME_REASON: &str = "auto-resume after cooldown";

#[derive(Debug, Clone)]
pub enum SafetyEvent {
    Paused { trigger: TriggerRecord },
    /// Threshold crossed while already paused
    ViolationRecorded { trigger: TriggerRecord },
    Resumed { record: ResumeRecord },
}

/// Process-wide circuit breaker. Cloning shares the same state.
#[derive(Clone)]
pub struct SafetyEnforcer {
    inner: Arc<SafetyEnforcerInner>,
}

struct SafetyEnforcerInner {
    config: SafetyConfig,
    /// Every mutation goes through this lock
    state: Mutex<SafetyState>,
    mode_tx: watch::Sender<SafetyMode>,
    event_tx: broadcast::Sender<SafetyEvent>,
}

impl SafetyEnforcer {
    pub fn new(config: SafetyConfig) -> Self {
        Self::with_state(config, SafetyState::default())
    }

    /// Start from a persisted state.
    pub fn with_state(config: SafetyConfig, state: SafetyState) -> Self {
        let (mode_tx, _) = watch::channel(state.mode);
        let (event_tx, _) = broadcast::channel(256);

        let inner = SafetyEnforcerInner {
            config,
            state: Mutex::new(state),
            mode_tx,
            event_tx,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.inner.config
    }

    pub fn mode(&self) -> SafetyMode {
        *self.inner.mode_tx.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.mode().is_paused()
    }

    /// Mode changes, for interrupting in-flight work.
    pub fn subscribe_mode(&self) -> watch::Receiver<SafetyMode> {
        self.inner.mode_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SafetyEvent> {
        self.inner.event_tx.subscribe()
    }

    fn emit_event(&self, event: SafetyEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    /// Evaluate one signal and return the mode afterwards.
    pub async fn record(&self, signal: SafetySignal) -> SafetyMode {
        let mut state = self.inner.state.lock().await;
        let crossed = apply_signal(&mut state, &self.inner.config, &signal);

        for trigger in crossed {
            state.push_violation(trigger.clone());

            if state.mode == SafetyMode::Active {
                tracing::error!(
                    "safety pause: {} ({}, measured {:.2} vs threshold {:.2})",
                    trigger.kind,
                    trigger.message,
                    trigger.measurement,
                    trigger.threshold
                );
                state.mode = SafetyMode::Paused;
                state.paused_at = Some(trigger.at);
                state.active_trigger = Some(trigger.clone());
                self.inner.mode_tx.send_replace(SafetyMode::Paused);
                self.emit_event(SafetyEvent::Paused { trigger });
            } else {
                tracing::warn!("safety violation while paused: {}", trigger.message);
                self.emit_event(SafetyEvent::ViolationRecorded { trigger });
            }
        }

        state.mode
    }

    /// Manual resume. Clears the streak, the error window and the last
    /// readings; the daily loss counter only resets at the day boundary.
    ///
    /// With `resume_guard_secs` set, fails with
    /// [`SafetyError::RecentViolations`] while a violation is that recent.
    pub async fn resume(&self, reason: impl Into<String>) -> Result<(), SafetyError> {
        self.resume_at(reason, Utc::now()).await
    }

    pub async fn resume_at(
        &self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), SafetyError> {
        let mut state = self.inner.state.lock().await;
        if state.mode == SafetyMode::Paused {
            self.check_resume_guard(&state, now)?;
        }
        self.resume_locked(&mut state, reason.into(), now, false)
    }

    /// Manual resume that ignores the resume guard.
    pub async fn force_resume(&self, reason: impl Into<String>) -> Result<(), SafetyError> {
        self.force_resume_at(reason, Utc::now()).await
    }

    pub async fn force_resume_at(
        &self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), SafetyError> {
        let mut state = self.inner.state.lock().await;
        let reason = reason.into();
        if self.check_resume_guard(&state, now).is_err() {
            tracing::warn!("forcing resume past recent violations: {}", reason);
        }
        self.resume_locked(&mut state, reason, now, false)
    }

    fn check_resume_guard(&self, state: &SafetyState, now: DateTime<Utc>) -> Result<(), SafetyError> {
        let Some(window_secs) = self.inner.config.resume_guard_secs else {
            return Ok(());
        };
        let window = chrono::Duration::seconds(i64::try_from(window_secs).unwrap_or(i64::MAX));
        let count = state
            .violations
            .iter()
            .filter(|v| now.signed_duration_since(v.at) < window)
            .count();
        if count > 0 {
            return Err(SafetyError::RecentViolations { count, window_secs });
        }
        Ok(())
    }

    /// Resume if the configured cooldown has elapsed. Returns true when it did.
    pub async fn poll_auto_resume(&self) -> bool {
        self.poll_auto_resume_at(Utc::now()).await
    }

    pub async fn poll_auto_resume_at(&self, now: DateTime<Utc>) -> bool {
        let Some(cooldown) = self.inner.config.auto_resume_after_secs else {
            return false;
        };
        let cooldown = chrono::Duration::seconds(i64::try_from(cooldown).unwrap_or(i64::MAX));

        let mut state = self.inner.state.lock().await;
        let due = state.mode == SafetyMode::Paused
            && state
                .paused_at
                .is_some_and(|paused_at| now.signed_duration_since(paused_at) >= cooldown);
        if !due {
            return false;
        }

        self.resume_locked(&mut state, AUTO_RESUME_REASON.to_string(), now, true)
            .is_ok()
    }

    fn resume_locked(
        &self,
        state: &mut SafetyState,
        reason: String,
        now: DateTime<Utc>,
        automatic: bool,
    ) -> Result<(), SafetyError> {
        if state.mode != SafetyMode::Paused {
            return Err(SafetyError::NotPaused);
        }

        let cleared = state.active_trigger.take();
        state.mode = SafetyMode::Active;
        state.paused_at = None;
        state.consecutive_losses = 0;
        state.error_window.clear();
        state.last_deviation_pct = None;
        state.last_sentiment = None;

        let record = ResumeRecord {
            reason,
            at: now,
            automatic,
        };
        tracing::info!(
            "safety resumed ({}): {}; cleared {}",
            if automatic { "auto" } else { "manual" },
            record.reason,
            cleared.map_or_else(|| "no trigger".to_string(), |t| t.kind.to_string())
        );
        state.last_resume = Some(record.clone());

        self.inner.mode_tx.send_replace(SafetyMode::Active);
        self.emit_event(SafetyEvent::Resumed { record });
        Ok(())
    }

    pub async fn snapshot(&self) -> SafetyState {
        self.inner.state.lock().await.clone()
    }

    /// Replace the whole state, e.g. with one loaded by the host.
    pub async fn restore(&self, restored: SafetyState) {
        let mut state = self.inner.state.lock().await;
        let mode = restored.mode;
        *state = restored;
        self.inner.mode_tx.send_replace(mode);
    }

    pub async fn status(&self) -> SafetyStatus {
        SafetyStatus::from(&*self.inner.state.lock().await)
    }
}
