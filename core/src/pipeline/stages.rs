//! Collaborators the controller drives: validation, evaluation and the
//! final decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::executor::ExecutionSummary;
use crate::optimizer::OptimizationResult;
use crate::planner::{ExecutionPlan, RequestContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationJudgment {
    pub complete: bool,
    #[serde(default)]
    pub missing_sources: Vec<String>,
}

impl ValidationJudgment {
    pub fn complete() -> Self {
        Self {
            complete: true,
            missing_sources: Vec::new(),
        }
    }

    pub fn incomplete<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            complete: false,
            missing_sources: missing.into_iter().map(Into::into).collect(),
        }
    }
}

/// What a validator sees after each research round.
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    pub request: &'a RequestContext,
    /// Every plan executed so far, the initial one first
    pub plans: &'a [ExecutionPlan],
    /// Merged summary of all rounds
    pub summary: &'a ExecutionSummary,
    pub iteration: u32,
}

#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;
    async fn judge(&self, input: ValidationInput<'_>) -> anyhow::Result<ValidationJudgment>;
}

/// Ordered evaluation step; each one receives the previous one's output.
#[async_trait]
pub trait EvaluationStage: Send + Sync {
    fn name(&self) -> &str;
    async fn evaluate(&self, input: Value) -> anyhow::Result<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionAction {
    #[serde(rename = "act")]
    Act,
    #[serde(rename = "no-action")]
    NoAction,
}

impl DecisionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Act => "act",
            Self::NoAction => "no-action",
        }
    }
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    pub rationale: String,
    /// Action parameters, opaque to the pipeline
    #[serde(default)]
    pub details: Value,
}

impl Decision {
    pub fn no_action(rationale: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::NoAction,
            confidence: 0.0,
            rationale: rationale.into(),
            details: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionInput {
    pub symbol: String,
    /// Output of the last evaluation stage
    pub evaluation: Value,
    pub optimization: Option<OptimizationResult>,
    pub degraded: bool,
    pub missing_sources: Vec<String>,
}

#[async_trait]
pub trait DecisionMaker: Send + Sync {
    fn name(&self) -> &str;
    async fn decide(&self, input: &DecisionInput) -> anyhow::Result<Decision>;
}
