//! Pipeline controller: sequences planning, research, validation,
//! evaluation and the decision as an explicit state machine.

mod controller;
pub mod stages;
mod state;
mod status;
mod transitions;

pub use controller::{DecisionReport, HaltReport, PipelineController, PipelineOutcome};
pub use stages::{
    Decision, DecisionAction, DecisionInput, DecisionMaker, EvaluationStage, ValidationInput,
    ValidationJudgment, Validator,
};
pub use state::{PipelineRun, PipelineStage, StageEntry};
pub use status::{StatusBoard, StatusSnapshot};
pub use transitions::{StageTransition, TransitionError};
