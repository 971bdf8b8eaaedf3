use async_trait::async_trait;
use serde_json::{json, Map, Value};

use vigil_core::api::{
    Decision, DecisionAction, DecisionInput, DecisionMaker, EvaluationStage, OptimizationStrategy,
    StrategyError,
};

/// Penalty per Critical task that failed.
const CRITICAL_FAILURE_PENALTY: f64 = 0.25;

/// Confidence multiplier when research never validated.
const DEGRADED_FACTOR: f64 = 0.5;

fn research_ids(evaluation: &Value) -> Vec<String> {
    evaluation
        .get("research")
        .and_then(Value::as_object)
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

/// Adds a `score` in `[0, 1]` to the research payload: the task success
/// ratio, reduced for every failed Critical task.
#[derive(Debug, Clone, Default)]
pub struct ResearchScoreStage;

#[async_trait]
impl EvaluationStage for ResearchScoreStage {
    fn name(&self) -> &str {
        "research-score"
    }

    async fn evaluate(&self, mut input: Value) -> anyhow::Result<Value> {
        let ratio = input
            .pointer("/stats/success_ratio")
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow::anyhow!("research payload has no stats.success_ratio"))?;
        let critical_failures = input
            .get("critical_failures")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let placeholders = input
            .get("research")
            .and_then(Value::as_object)
            .map_or(0, |m| {
                m.values()
                    .filter(|v| v.get("placeholder") == Some(&Value::Bool(true)))
                    .count()
            });

        let score = (ratio - CRITICAL_FAILURE_PENALTY * critical_failures as f64).clamp(0.0, 1.0);
        let obj = input
            .as_object_mut()
            .ok_or_else(|| anyhow::anyhow!("research payload is not an object"))?;
        obj.insert("score".into(), json!(score));
        obj.insert("placeholder_results".into(), json!(placeholders));
        Ok(input)
    }
}

/// Spreads weight evenly over every completed research result. Serves as
/// the fallback when no primary optimizer is available. An empty research
/// set yields empty weights.
#[derive(Debug, Clone, Default)]
pub struct EqualWeightOptimizer;

#[async_trait]
impl OptimizationStrategy for EqualWeightOptimizer {
    fn name(&self) -> &str {
        "equal-weight"
    }

    async fn optimize(&self, input: &Value) -> Result<Value, StrategyError> {
        if !input.is_object() {
            return Err(StrategyError::Failed {
                name: self.name().to_string(),
                message: "input is not a research payload".into(),
            });
        }

        let ids = research_ids(input);
        let weight = 1.0 / ids.len() as f64;
        let weights: Map<String, Value> = ids.into_iter().map(|id| (id, json!(weight))).collect();
        Ok(json!({ "weights": weights }))
    }
}

/// Acts when confidence clears a threshold and no Critical task failed.
///
/// Confidence is the evaluation `score` (or the raw success ratio when no
/// scoring stage ran), halved for degraded runs.
#[derive(Debug, Clone)]
pub struct ThresholdDecisionMaker {
    min_confidence: f64,
}

impl Default for ThresholdDecisionMaker {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
        }
    }
}

impl ThresholdDecisionMaker {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            min_confidence: min_confidence.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl DecisionMaker for ThresholdDecisionMaker {
    fn name(&self) -> &str {
        "threshold"
    }

    async fn decide(&self, input: &DecisionInput) -> anyhow::Result<Decision> {
        let evaluation = &input.evaluation;
        let score = evaluation
            .get("score")
            .and_then(Value::as_f64)
            .or_else(|| evaluation.pointer("/stats/success_ratio").and_then(Value::as_f64))
            .unwrap_or(0.0);
        let confidence = if input.degraded {
            score * DEGRADED_FACTOR
        } else {
            score
        };
        let critical_failures = evaluation
            .get("critical_failures")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        let (action, rationale) = if critical_failures > 0 {
            (
                DecisionAction::NoAction,
                format!("{critical_failures} critical research task(s) failed"),
            )
        } else if confidence < self.min_confidence {
            (
                DecisionAction::NoAction,
                format!(
                    "confidence {:.2} below threshold {:.2}",
                    confidence, self.min_confidence
                ),
            )
        } else {
            (
                DecisionAction::Act,
                format!("research on {} supports acting", input.symbol),
            )
        };

        let rationale = if input.degraded {
            format!(
                "{rationale} (degraded, missing: {})",
                input.missing_sources.join(", ")
            )
        } else {
            rationale
        };

        Ok(Decision {
            action,
            confidence,
            rationale,
            details: json!({
                "score": score,
                "weights": input.optimization.as_ref().map(|o| &o.payload["weights"]),
            }),
        })
    }
}
