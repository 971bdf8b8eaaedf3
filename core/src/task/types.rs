use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Task priority levels. Ordering follows severity: `Critical < High < ...`
/// so an ascending sort puts critical work first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Must complete for a valid decision
    Critical,
    High,
    Medium,
    /// Nice to have
    Low,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Never started: a dependency did not complete, or the plan was halted.
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// A unit of research work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: TaskPriority,
    /// Ordered; the first entry selects the handler.
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub estimated_cost: f64,
    pub estimated_duration_ms: u64,
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_retries: u32,
    /// Optional tasks may be dropped by the planner to fit a budget.
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    /// Attempts started so far.
    #[serde(default)]
    pub attempts: u32,
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: TaskPriority) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            priority,
            data_sources: Vec::new(),
            dependencies: Vec::new(),
            estimated_cost: 0.0,
            estimated_duration_ms: 0,
            timeout_ms: 30_000,
            max_retries: 0,
            optional: false,
            status: TaskStatus::Pending,
            attempts: 0,
        }
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = cost;
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.estimated_duration_ms = ms;
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn estimated_duration(&self) -> Duration {
        Duration::from_millis(self.estimated_duration_ms)
    }

    pub fn primary_source(&self) -> Option<&str> {
        self.data_sources.first().map(String::as_str)
    }

    pub fn is_critical(&self) -> bool {
        self.priority == TaskPriority::Critical
    }

    /// Attempts still allowed after the ones already made.
    pub fn remaining_attempts(&self) -> u32 {
        (self.max_retries + 1).saturating_sub(self.attempts)
    }
}

/// Common task interface for dependency graph handling.
pub trait TaskLike: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

impl TaskLike for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}
