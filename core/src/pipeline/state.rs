use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transitions::{StageTransition, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Planning,
    Researching,
    Validating,
    Evaluating,
    Deciding,
    Done,
    Halted,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Researching => "researching",
            Self::Validating => "validating",
            Self::Evaluating => "evaluating",
            Self::Deciding => "deciding",
            Self::Done => "done",
            Self::Halted => "halted",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: PipelineStage,
    pub entered_at: DateTime<Utc>,
}

/// One pass through the pipeline for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub symbol: String,
    pub stage: PipelineStage,
    /// Research rounds completed
    pub iteration: u32,
    /// Bumped on every entry to Researching
    pub revision: u32,
    /// Progressed without complete research
    pub degraded: bool,
    pub missing_sources: Vec<String>,
    pub history: Vec<StageEntry>,
    pub started_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(symbol: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            stage: PipelineStage::Planning,
            iteration: 0,
            revision: 0,
            degraded: false,
            missing_sources: Vec::new(),
            history: vec![StageEntry {
                stage: PipelineStage::Planning,
                entered_at: now,
            }],
            started_at: now,
        }
    }

    pub fn advance(&mut self, to: PipelineStage) -> Result<(), TransitionError> {
        StageTransition::validate(self.stage, to)?;
        if to == PipelineStage::Researching {
            self.revision += 1;
        }
        self.stage = to;
        self.history.push(StageEntry {
            stage: to,
            entered_at: Utc::now(),
        });
        Ok(())
    }

    pub(crate) fn complete_round(&mut self) {
        self.iteration += 1;
    }

    pub(crate) fn mark_degraded(&mut self, missing_sources: Vec<String>) {
        self.degraded = true;
        self.missing_sources = missing_sources;
    }

    pub fn is_terminal(&self) -> bool {
        StageTransition::is_terminal(self.stage)
    }

    /// Stages visited, in order.
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.history.iter().map(|e| e.stage).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_tracks_research_entries() {
        let mut run = PipelineRun::new("BTC/USDT");
        run.advance(PipelineStage::Researching).unwrap();
        run.advance(PipelineStage::Validating).unwrap();
        run.advance(PipelineStage::Researching).unwrap();
        assert_eq!(run.revision, 2);
        assert_eq!(run.iteration, 0);
        assert_eq!(
            run.stages(),
            vec![
                PipelineStage::Planning,
                PipelineStage::Researching,
                PipelineStage::Validating,
                PipelineStage::Researching,
            ]
        );
    }

    #[test]
    fn test_illegal_advance_leaves_run_untouched() {
        let mut run = PipelineRun::new("BTC/USDT");
        assert!(run.advance(PipelineStage::Done).is_err());
        assert_eq!(run.stage, PipelineStage::Planning);
        assert_eq!(run.history.len(), 1);
    }
}
