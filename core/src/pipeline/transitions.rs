//! Pipeline stage transition rules

use thiserror::Error;

use super::state::PipelineStage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
    },
    #[error("Cannot transition from terminal stage {stage:?}")]
    FromTerminalStage { stage: PipelineStage },
}

pub struct StageTransition;

impl StageTransition {
    pub fn validate(from: PipelineStage, to: PipelineStage) -> Result<(), TransitionError> {
        if Self::is_terminal(from) {
            return Err(TransitionError::FromTerminalStage { stage: from });
        }

        let is_valid = matches!(
            (from, to),
            (PipelineStage::Planning, PipelineStage::Researching)
                | (PipelineStage::Researching, PipelineStage::Validating)
                // incomplete research, another round
                | (PipelineStage::Validating, PipelineStage::Researching)
                | (PipelineStage::Validating, PipelineStage::Evaluating)
                | (PipelineStage::Evaluating, PipelineStage::Deciding)
                | (PipelineStage::Deciding, PipelineStage::Done)
                // safety pause, from any non-terminal stage
                | (_, PipelineStage::Halted)
        );

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// Next stage on the happy path.
    pub fn next_stage(current: PipelineStage) -> Option<PipelineStage> {
        match current {
            PipelineStage::Planning => Some(PipelineStage::Researching),
            PipelineStage::Researching => Some(PipelineStage::Validating),
            PipelineStage::Validating => Some(PipelineStage::Evaluating),
            PipelineStage::Evaluating => Some(PipelineStage::Deciding),
            PipelineStage::Deciding => Some(PipelineStage::Done),
            PipelineStage::Done | PipelineStage::Halted => None,
        }
    }

    pub fn is_terminal(stage: PipelineStage) -> bool {
        matches!(stage, PipelineStage::Done | PipelineStage::Halted)
    }

    pub fn stage_description(stage: PipelineStage) -> &'static str {
        match stage {
            PipelineStage::Planning => "building research plan",
            PipelineStage::Researching => "running research tasks",
            PipelineStage::Validating => "checking research coverage",
            PipelineStage::Evaluating => "evaluating research",
            PipelineStage::Deciding => "producing decision",
            PipelineStage::Done => "decision produced",
            PipelineStage::Halted => "halted by safety pause",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(StageTransition::validate(PipelineStage::Planning, PipelineStage::Researching).is_ok());
        assert!(
            StageTransition::validate(PipelineStage::Validating, PipelineStage::Researching).is_ok()
        );
        assert!(StageTransition::validate(PipelineStage::Deciding, PipelineStage::Done).is_ok());
        assert!(StageTransition::validate(PipelineStage::Evaluating, PipelineStage::Halted).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(
            StageTransition::validate(PipelineStage::Planning, PipelineStage::Deciding),
            Err(TransitionError::InvalidTransition {
                from: PipelineStage::Planning,
                to: PipelineStage::Deciding
            })
        );
        assert!(
            StageTransition::validate(PipelineStage::Researching, PipelineStage::Evaluating).is_err()
        );
        assert_eq!(
            StageTransition::validate(PipelineStage::Halted, PipelineStage::Halted),
            Err(TransitionError::FromTerminalStage {
                stage: PipelineStage::Halted
            })
        );
        assert!(StageTransition::validate(PipelineStage::Done, PipelineStage::Planning).is_err());
    }

    #[test]
    fn test_next_stage() {
        assert_eq!(
            StageTransition::next_stage(PipelineStage::Validating),
            Some(PipelineStage::Evaluating)
        );
        assert_eq!(StageTransition::next_stage(PipelineStage::Done), None);
    }
}
