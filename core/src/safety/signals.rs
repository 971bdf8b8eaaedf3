use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observation fed into the safety enforcer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SafetySignal {
    /// Realized outcome of an executed decision; negative pnl is a loss.
    OutcomeRealized { pnl: f64, at: DateTime<Utc> },
    ErrorObserved {
        source: String,
        message: String,
        at: DateTime<Utc>,
    },
    /// Expected vs actual execution price.
    DeviationObserved {
        expected: f64,
        actual: f64,
        at: DateTime<Utc>,
    },
    /// Aggregate market sentiment in `[-1, 1]`.
    SentimentObserved { score: f64, at: DateTime<Utc> },
}

impl SafetySignal {
    pub fn outcome(pnl: f64) -> Self {
        Self::OutcomeRealized { pnl, at: Utc::now() }
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ErrorObserved {
            source: source.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn deviation(expected: f64, actual: f64) -> Self {
        Self::DeviationObserved {
            expected,
            actual,
            at: Utc::now(),
        }
    }

    pub fn sentiment(score: f64) -> Self {
        Self::SentimentObserved {
            score,
            at: Utc::now(),
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::OutcomeRealized { at, .. }
            | Self::ErrorObserved { at, .. }
            | Self::DeviationObserved { at, .. }
            | Self::SentimentObserved { at, .. } => *at,
        }
    }
}
