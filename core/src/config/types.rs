use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::planner::RiskProfile;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Reject out-of-range values. Called by the loaders; hosts building a
    /// config by hand should call it too.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(cap) = self.planner.budget_cap {
            if !cap.is_finite() || cap < 0.0 {
                return Err(invalid("planner.budget_cap", format!("{cap} is not a valid cost")));
            }
        }
        if self.executor.max_in_flight == 0 {
            return Err(invalid("executor.max_in_flight", "must be at least 1"));
        }
        let retry = &self.executor.retry;
        if retry.base_delay_ms > retry.max_delay_ms {
            return Err(invalid(
                "executor.retry.base_delay_ms",
                format!("{} exceeds max_delay_ms {}", retry.base_delay_ms, retry.max_delay_ms),
            ));
        }
        if self.pipeline.max_iterations == 0 {
            return Err(invalid("pipeline.max_iterations", "must be at least 1"));
        }

        let s = &self.safety;
        if s.max_consecutive_losses == 0 {
            return Err(invalid("safety.max_consecutive_losses", "must be at least 1"));
        }
        if !s.max_daily_loss.is_finite() || s.max_daily_loss < 0.0 {
            return Err(invalid(
                "safety.max_daily_loss",
                format!("{} is not a valid loss limit", s.max_daily_loss),
            ));
        }
        if !s.max_deviation_pct.is_finite() || s.max_deviation_pct < 0.0 {
            return Err(invalid(
                "safety.max_deviation_pct",
                format!("{} is not a valid percentage", s.max_deviation_pct),
            ));
        }
        if !(-1.0..=1.0).contains(&s.min_sentiment) {
            return Err(invalid(
                "safety.min_sentiment",
                format!("{} is outside [-1, 1]", s.min_sentiment),
            ));
        }
        if s.error_window_secs == 0 {
            return Err(invalid("safety.error_window_secs", "must be at least 1"));
        }
        if s.daily_reset_hour_utc > 23 {
            return Err(invalid(
                "safety.daily_reset_hour_utc",
                format!("{} is not an hour of the day", s.daily_reset_hour_utc),
            ));
        }
        if self.optimizer.primary_timeout_ms == 0 {
            return Err(invalid("optimizer.primary_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or `~/.vigil/logs` if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "vigil_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Plan-wide cost cap, used when the planning profile sets none.
    #[serde(default)]
    pub budget_cap: Option<f64>,

    #[serde(default)]
    pub default_profile: RiskProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on concurrently running tasks within a batch.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_in_flight() -> usize {
    4
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            retry: RetryConfig::default(),
        }
    }
}

/// Delay between attempts of a failed task. The attempt count itself
/// comes from each task's `max_retries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// "immediate", "linear" or "exponential-backoff"
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,

    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_retry_strategy() -> String {
    "immediate".to_string()
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: default_retry_base_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Research rounds per run, the first one included.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Forward failed task attempts to the safety enforcer.
    #[serde(default = "default_report_task_errors")]
    pub report_task_errors: bool,
}

fn default_max_iterations() -> u32 {
    3
}

fn default_report_task_errors() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            report_task_errors: default_report_task_errors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,

    /// Absolute loss allowed per trading day.
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,

    #[serde(default = "default_max_deviation_pct")]
    pub max_deviation_pct: f64,

    #[serde(default = "default_max_errors_per_window")]
    pub max_errors_per_window: u32,

    #[serde(default = "default_error_window_secs")]
    pub error_window_secs: u64,

    /// UTC hour at which the daily loss counter resets.
    #[serde(default)]
    pub daily_reset_hour_utc: u32,

    /// Pause when a sentiment reading drops below this score.
    #[serde(default = "default_min_sentiment")]
    pub min_sentiment: f64,

    /// Resume automatically this long after a pause. Unset means manual only.
    #[serde(default)]
    pub auto_resume_after_secs: Option<u64>,

    /// Refuse a manual resume while a violation is younger than this.
    /// A forced resume ignores it.
    #[serde(default)]
    pub resume_guard_secs: Option<u64>,
}

fn default_max_consecutive_losses() -> u32 {
    3
}

fn default_max_daily_loss() -> f64 {
    10.0
}

fn default_max_deviation_pct() -> f64 {
    1.0
}

fn default_max_errors_per_window() -> u32 {
    5
}

fn default_error_window_secs() -> u64 {
    60
}

fn default_min_sentiment() -> f64 {
    -0.3
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_consecutive_losses: default_max_consecutive_losses(),
            max_daily_loss: default_max_daily_loss(),
            max_deviation_pct: default_max_deviation_pct(),
            max_errors_per_window: default_max_errors_per_window(),
            error_window_secs: default_error_window_secs(),
            daily_reset_hour_utc: 0,
            min_sentiment: default_min_sentiment(),
            auto_resume_after_secs: None,
            resume_guard_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub primary_enabled: bool,

    #[serde(default = "default_primary_timeout_ms")]
    pub primary_timeout_ms: u64,
}

fn default_primary_timeout_ms() -> u64 {
    30_000
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            primary_enabled: false,
            primary_timeout_ms: default_primary_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.executor.max_in_flight, 4);
        assert_eq!(cfg.executor.retry.strategy, "immediate");
        assert_eq!(cfg.pipeline.max_iterations, 3);
        assert!(cfg.pipeline.report_task_errors);
        assert_eq!(cfg.safety.max_consecutive_losses, 3);
        assert_eq!(cfg.safety.max_errors_per_window, 5);
        assert_eq!(cfg.planner.default_profile, RiskProfile::Balanced);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [safety]
            max_daily_loss = 25.0
            auto_resume_after_secs = 600
            resume_guard_secs = 1800

            [planner]
            budget_cap = 0.2
            default_profile = "conservative"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.safety.max_daily_loss, 25.0);
        assert_eq!(cfg.safety.auto_resume_after_secs, Some(600));
        assert_eq!(cfg.safety.resume_guard_secs, Some(1800));
        assert_eq!(cfg.safety.max_deviation_pct, 1.0);
        assert_eq!(cfg.safety.min_sentiment, -0.3);
        assert_eq!(cfg.planner.budget_cap, Some(0.2));
        assert_eq!(cfg.planner.default_profile, RiskProfile::Conservative);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut cfg = AppConfig::default();
        cfg.pipeline.max_iterations = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid {
                field: "pipeline.max_iterations",
                ..
            })
        ));

        let mut cfg = AppConfig::default();
        cfg.safety.daily_reset_hour_utc = 24;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.planner.budget_cap = Some(-1.0);
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.safety.min_sentiment = -1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid {
                field: "safety.min_sentiment",
                ..
            })
        ));
    }
}
