pub mod decision;
pub mod portfolio;
pub mod retry;

pub use decision::{EqualWeightOptimizer, ResearchScoreStage, ThresholdDecisionMaker};
pub use portfolio::MeanVarianceOptimizer;
pub use retry::{ExponentialBackoffRetry, LinearBackoffRetry};
