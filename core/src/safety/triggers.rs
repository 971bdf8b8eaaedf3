//! Circuit-breaker triggers.
//!
//! A signal updates the counters it feeds, then the triggers depending on
//! those counters are checked in severity order:
//!
//! | order | trigger             | fed by              | crosses when                         |
//! |-------|---------------------|---------------------|--------------------------------------|
//! | 1     | `DailyLossLimit`    | `OutcomeRealized`   | net daily pnl < -max_daily_loss      |
//! | 2     | `ConsecutiveLosses` | `OutcomeRealized`   | streak >= max_consecutive_losses     |
//! | 3     | `PriceDeviation`    | `DeviationObserved` | deviation % > max_deviation_pct      |
//! | 4     | `ErrorBurst`        | `ErrorObserved`     | errors in window > max per window    |
//! | 5     | `SentimentDrop`     | `SentimentObserved` | score < min_sentiment                |

use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::signals::SafetySignal;
use super::state::SafetyState;
use crate::config::SafetyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    DailyLossLimit,
    ConsecutiveLosses,
    PriceDeviation,
    ErrorBurst,
    SentimentDrop,
}

impl TriggerKind {
    /// Severity order, most severe first.
    pub const ALL: [TriggerKind; 5] = [
        TriggerKind::DailyLossLimit,
        TriggerKind::ConsecutiveLosses,
        TriggerKind::PriceDeviation,
        TriggerKind::ErrorBurst,
        TriggerKind::SentimentDrop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DailyLossLimit => "daily_loss_limit",
            Self::ConsecutiveLosses => "consecutive_losses",
            Self::PriceDeviation => "price_deviation",
            Self::ErrorBurst => "error_burst",
            Self::SentimentDrop => "sentiment_drop",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One threshold crossing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub kind: TriggerKind,
    pub measurement: f64,
    pub threshold: f64,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Start of the trading day containing `at`, for a day that begins at
/// `reset_hour` UTC.
pub fn trading_day_start(at: DateTime<Utc>, reset_hour: u32) -> DateTime<Utc> {
    let shifted = at - Duration::hours(i64::from(reset_hour));
    shifted
        .date_naive()
        .and_hms_opt(reset_hour, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(at)
}

/// Fold `signal` into the counters and return the triggers it crossed, in
/// severity order.
pub(crate) fn apply_signal(
    state: &mut SafetyState,
    cfg: &SafetyConfig,
    signal: &SafetySignal,
) -> Vec<TriggerRecord> {
    let mut crossed = Vec::new();

    match signal {
        SafetySignal::OutcomeRealized { pnl, at } => {
            let day = trading_day_start(*at, cfg.daily_reset_hour_utc);
            if state.day_start != Some(day) {
                state.day_start = Some(day);
                state.daily_pnl = 0.0;
            }
            state.daily_pnl += pnl;

            if *pnl < 0.0 {
                state.consecutive_losses += 1;
            } else {
                state.consecutive_losses = 0;
            }

            if state.daily_pnl < -cfg.max_daily_loss {
                crossed.push(TriggerRecord {
                    kind: TriggerKind::DailyLossLimit,
                    measurement: -state.daily_pnl,
                    threshold: cfg.max_daily_loss,
                    message: format!(
                        "daily loss {:.2} exceeds limit {:.2}",
                        -state.daily_pnl, cfg.max_daily_loss
                    ),
                    at: *at,
                });
            }
            if state.consecutive_losses >= cfg.max_consecutive_losses {
                crossed.push(TriggerRecord {
                    kind: TriggerKind::ConsecutiveLosses,
                    measurement: f64::from(state.consecutive_losses),
                    threshold: f64::from(cfg.max_consecutive_losses),
                    message: format!(
                        "{} consecutive losses (limit {})",
                        state.consecutive_losses, cfg.max_consecutive_losses
                    ),
                    at: *at,
                });
            }
        }

        SafetySignal::DeviationObserved {
            expected,
            actual,
            at,
        } => {
            if *expected == 0.0 {
                return crossed;
            }
            let pct = ((actual - expected) / expected).abs() * 100.0;
            state.last_deviation_pct = Some(pct);

            if pct > cfg.max_deviation_pct {
                crossed.push(TriggerRecord {
                    kind: TriggerKind::PriceDeviation,
                    measurement: pct,
                    threshold: cfg.max_deviation_pct,
                    message: format!(
                        "price deviation {:.2}% exceeds {:.2}% (expected {}, actual {})",
                        pct, cfg.max_deviation_pct, expected, actual
                    ),
                    at: *at,
                });
            }
        }

        SafetySignal::ErrorObserved { source, at, .. } => {
            let window = Duration::seconds(i64::try_from(cfg.error_window_secs).unwrap_or(i64::MAX));
            state.expire_errors(*at, window);
            state.error_window.push_back(*at);

            let count = state.error_window.len();
            if count > cfg.max_errors_per_window as usize {
                crossed.push(TriggerRecord {
                    kind: TriggerKind::ErrorBurst,
                    measurement: count as f64,
                    threshold: f64::from(cfg.max_errors_per_window),
                    message: format!(
                        "{} errors in {}s (limit {}), last from '{}'",
                        count, cfg.error_window_secs, cfg.max_errors_per_window, source
                    ),
                    at: *at,
                });
            }
        }

        SafetySignal::SentimentObserved { score, at } => {
            if !score.is_finite() {
                return crossed;
            }
            state.last_sentiment = Some(*score);

            if *score < cfg.min_sentiment {
                crossed.push(TriggerRecord {
                    kind: TriggerKind::SentimentDrop,
                    measurement: *score,
                    threshold: cfg.min_sentiment,
                    message: format!(
                        "sentiment {:.2} below minimum {:.2}",
                        score, cfg.min_sentiment
                    ),
                    at: *at,
                });
            }
        }
    }

    crossed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    fn outcome(pnl: f64, when: DateTime<Utc>) -> SafetySignal {
        SafetySignal::OutcomeRealized { pnl, at: when }
    }

    #[test]
    fn test_consecutive_losses_fire_at_threshold_and_reset_on_win() {
        let cfg = SafetyConfig::default();
        let mut state = SafetyState::default();

        assert!(apply_signal(&mut state, &cfg, &outcome(-0.1, at(1, 0, 0))).is_empty());
        assert!(apply_signal(&mut state, &cfg, &outcome(-0.1, at(1, 1, 0))).is_empty());
        assert!(apply_signal(&mut state, &cfg, &outcome(0.0, at(1, 2, 0))).is_empty());
        assert_eq!(state.consecutive_losses, 0);

        for minute in 3..5 {
            apply_signal(&mut state, &cfg, &outcome(-0.1, at(1, minute, 0)));
        }
        let crossed = apply_signal(&mut state, &cfg, &outcome(-0.1, at(1, 5, 0)));
        assert_eq!(crossed.len(), 1);
        assert_eq!(crossed[0].kind, TriggerKind::ConsecutiveLosses);
        assert_eq!(crossed[0].measurement, 3.0);
    }

    #[test]
    fn test_daily_loss_ranks_before_streak() {
        let cfg = SafetyConfig {
            max_daily_loss: 5.0,
            max_consecutive_losses: 2,
            ..SafetyConfig::default()
        };
        let mut state = SafetyState::default();
        apply_signal(&mut state, &cfg, &outcome(-3.0, at(2, 0, 0)));
        let crossed = apply_signal(&mut state, &cfg, &outcome(-3.0, at(3, 0, 0)));
        let kinds: Vec<TriggerKind> = crossed.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TriggerKind::DailyLossLimit, TriggerKind::ConsecutiveLosses]
        );
        assert_eq!(crossed[0].measurement, 6.0);
    }

    #[test]
    fn test_daily_pnl_resets_at_boundary() {
        let cfg = SafetyConfig {
            daily_reset_hour_utc: 8,
            ..SafetyConfig::default()
        };
        let mut state = SafetyState::default();
        apply_signal(&mut state, &cfg, &outcome(-4.0, at(7, 0, 0)));
        apply_signal(&mut state, &cfg, &outcome(-4.0, at(7, 59, 59)));
        assert_eq!(state.daily_pnl, -8.0);

        apply_signal(&mut state, &cfg, &outcome(-4.0, at(8, 0, 0)));
        assert_eq!(state.daily_pnl, -4.0);
        assert_eq!(state.day_start, Some(at(8, 0, 0)));
    }

    #[test]
    fn test_trading_day_start() {
        assert_eq!(trading_day_start(at(12, 30, 0), 0), at(0, 0, 0));
        assert_eq!(
            trading_day_start(at(3, 0, 0), 8),
            Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_deviation_threshold_is_exclusive() {
        let cfg = SafetyConfig::default();
        let mut state = SafetyState::default();
        let dev = |expected, actual| SafetySignal::DeviationObserved {
            expected,
            actual,
            at: at(1, 0, 0),
        };

        assert!(apply_signal(&mut state, &cfg, &dev(100.0, 100.5)).is_empty());
        assert!(apply_signal(&mut state, &cfg, &dev(0.0, 50.0)).is_empty());
        // expected = 0 leaves the last measurement alone
        assert!(state.last_deviation_pct.is_some_and(|d| (d - 0.5).abs() < 1e-9));

        let crossed = apply_signal(&mut state, &cfg, &dev(100.0, 98.0));
        assert_eq!(crossed[0].kind, TriggerKind::PriceDeviation);
        assert!((crossed[0].measurement - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_burst_window_expires() {
        let cfg = SafetyConfig::default();
        let mut state = SafetyState::default();
        let err = |s| SafetySignal::ErrorObserved {
            source: "news".into(),
            message: "timeout".into(),
            at: at(1, 0, s),
        };

        for s in 0..5 {
            assert!(apply_signal(&mut state, &cfg, &err(s)).is_empty());
        }
        assert_eq!(apply_signal(&mut state, &cfg, &err(5))[0].kind, TriggerKind::ErrorBurst);

        // a minute later the early entries have expired
        let late = SafetySignal::ErrorObserved {
            source: "news".into(),
            message: "timeout".into(),
            at: at(1, 1, 3),
        };
        assert!(apply_signal(&mut state, &cfg, &late).is_empty());
        assert_eq!(state.error_window.len(), 3);
    }

    #[test]
    fn test_sentiment_drop_is_strictly_below_minimum() {
        let cfg = SafetyConfig::default();
        let mut state = SafetyState::default();
        let mood = |score| SafetySignal::SentimentObserved {
            score,
            at: at(1, 0, 0),
        };

        assert!(apply_signal(&mut state, &cfg, &mood(-0.3)).is_empty());
        assert!(apply_signal(&mut state, &cfg, &mood(f64::NAN)).is_empty());
        assert_eq!(state.last_sentiment, Some(-0.3));

        let crossed = apply_signal(&mut state, &cfg, &mood(-0.45));
        assert_eq!(crossed.len(), 1);
        assert_eq!(crossed[0].kind, TriggerKind::SentimentDrop);
        assert_eq!(crossed[0].threshold, -0.3);
        assert_eq!(TriggerKind::SentimentDrop.to_string(), "sentiment_drop");
    }
}
