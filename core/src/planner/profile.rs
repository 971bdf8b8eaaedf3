use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Risk/thoroughness setting that drives template selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl RiskProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(format!("unknown risk profile: {other}")),
        }
    }
}

/// Planning profile: thoroughness and parallelism settings for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningProfile {
    #[serde(default)]
    pub risk: RiskProfile,

    /// Upper bound on concurrently running tasks requested by this profile.
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,

    #[serde(default = "default_include_optional_tasks")]
    pub include_optional_tasks: bool,

    /// task_id -> timeout in milliseconds
    #[serde(default)]
    pub timeout_overrides: BTreeMap<String, u64>,

    /// Overrides the planner-level budget cap when set.
    #[serde(default)]
    pub budget_cap: Option<f64>,
}

fn default_max_parallel_tasks() -> usize {
    3
}

fn default_include_optional_tasks() -> bool {
    true
}

impl Default for PlanningProfile {
    fn default() -> Self {
        Self::for_risk(RiskProfile::default())
    }
}

impl PlanningProfile {
    pub fn for_risk(risk: RiskProfile) -> Self {
        Self {
            risk,
            max_parallel_tasks: default_max_parallel_tasks(),
            include_optional_tasks: default_include_optional_tasks(),
            timeout_overrides: BTreeMap::new(),
            budget_cap: None,
        }
    }

    pub fn conservative() -> Self {
        Self::for_risk(RiskProfile::Conservative)
    }

    pub fn balanced() -> Self {
        Self::for_risk(RiskProfile::Balanced)
    }

    pub fn aggressive() -> Self {
        Self::for_risk(RiskProfile::Aggressive)
    }

    pub fn with_max_parallel(mut self, n: usize) -> Self {
        self.max_parallel_tasks = n;
        self
    }

    pub fn with_optional_tasks(mut self, include: bool) -> Self {
        self.include_optional_tasks = include;
        self
    }

    pub fn with_timeout_override(mut self, task_id: impl Into<String>, timeout_ms: u64) -> Self {
        self.timeout_overrides.insert(task_id.into(), timeout_ms);
        self
    }

    pub fn with_budget_cap(mut self, cap: f64) -> Self {
        self.budget_cap = Some(cap);
        self
    }
}
