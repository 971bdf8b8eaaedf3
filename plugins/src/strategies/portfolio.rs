use async_trait::async_trait;
use serde_json::{json, Map, Value};

use vigil_core::api::{OptimizationStrategy, StrategyError};

/// Variance assumed for a result that reports a signal but no variance.
const DEFAULT_VARIANCE: f64 = 1.0;

const MIN_VARIANCE: f64 = 1e-6;

/// Mean-variance weights over research signals, with a diagonal covariance.
///
/// Each completed research result may carry a `signal` in `[-1, 1]` and a
/// `variance`. The raw weight of a result is `signal / (risk_aversion * variance)`;
/// weights are then scaled so their absolute values sum to 1. Results without
/// a numeric signal (placeholders, for instance) get no weight, and a payload
/// with no signal at all is an error so the selector falls back.
#[derive(Debug, Clone)]
pub struct MeanVarianceOptimizer {
    risk_aversion: f64,
}

impl Default for MeanVarianceOptimizer {
    fn default() -> Self {
        Self { risk_aversion: 1.0 }
    }
}

impl MeanVarianceOptimizer {
    pub fn new(risk_aversion: f64) -> Self {
        Self {
            risk_aversion: if risk_aversion > 0.0 { risk_aversion } else { 1.0 },
        }
    }

    fn failed(&self, message: impl Into<String>) -> StrategyError {
        StrategyError::Failed {
            name: self.name().to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl OptimizationStrategy for MeanVarianceOptimizer {
    fn name(&self) -> &str {
        "mean-variance"
    }

    async fn optimize(&self, input: &Value) -> Result<Value, StrategyError> {
        let research = input
            .get("research")
            .and_then(Value::as_object)
            .ok_or_else(|| self.failed("input is not a research payload"))?;

        let signals: Vec<(&String, f64, f64)> = research
            .iter()
            .filter_map(|(id, output)| {
                let signal = output.get("signal").and_then(Value::as_f64)?;
                let variance = output
                    .get("variance")
                    .and_then(Value::as_f64)
                    .unwrap_or(DEFAULT_VARIANCE)
                    .max(MIN_VARIANCE);
                Some((id, signal.clamp(-1.0, 1.0), variance))
            })
            .collect();
        if signals.is_empty() {
            return Err(self.failed("no research result carries a numeric signal"));
        }

        let raw: Vec<(&String, f64, f64)> = signals
            .iter()
            .map(|&(id, signal, variance)| (id, signal, signal / (self.risk_aversion * variance)))
            .collect();
        let gross: f64 = raw.iter().map(|(_, _, w)| w.abs()).sum();
        if gross == 0.0 {
            return Err(self.failed("every research signal is neutral"));
        }

        let mut weights = Map::new();
        let mut expected = 0.0;
        for (id, signal, w) in raw {
            let weight = w / gross;
            expected += weight * signal;
            weights.insert(id.clone(), json!(weight));
        }

        Ok(json!({
            "weights": weights,
            "expected_signal": expected,
            "gross_exposure": 1.0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight(out: &Value, id: &str) -> f64 {
        out["weights"][id].as_f64().unwrap()
    }

    #[tokio::test]
    async fn test_weights_scale_with_signal_over_variance() {
        let input = json!({
            "research": {
                "task_sentiment": { "signal": 0.5, "variance": 0.25 },
                "task_technical": { "signal": -0.5 },
                "task_macro": { "placeholder": true },
            }
        });

        let out = MeanVarianceOptimizer::default().optimize(&input).await.unwrap();

        // raw weights 2.0 and -0.5, gross 2.5
        assert!((weight(&out, "task_sentiment") - 0.8).abs() < 1e-9);
        assert!((weight(&out, "task_technical") + 0.2).abs() < 1e-9);
        assert!(out["weights"].get("task_macro").is_none());
        assert!((out["expected_signal"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_placeholder_only_research_is_an_error() {
        let input = json!({
            "research": { "task_macro": { "placeholder": true } }
        });
        let err = MeanVarianceOptimizer::default()
            .optimize(&input)
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Failed { ref name, .. } if name == "mean-variance"));
    }

    #[tokio::test]
    async fn test_neutral_signals_are_an_error() {
        let input = json!({ "research": { "task_onchain": { "signal": 0.0 } } });
        assert!(MeanVarianceOptimizer::new(2.0).optimize(&input).await.is_err());
    }
}
