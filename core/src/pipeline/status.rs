use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::state::PipelineRun;
use crate::planner::PlanSummary;
use crate::safety::SafetyStatus;

/// Read-only view returned by the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Most recent run, finished or not
    pub pipeline: Option<PipelineRun>,
    pub safety: SafetyStatus,
    pub last_plan: Option<PlanSummary>,
}

#[derive(Debug, Default)]
struct Board {
    run: Option<PipelineRun>,
    last_plan: Option<PlanSummary>,
}

/// Latest pipeline run and plan, published by the controller.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<Board>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn publish_run(&self, run: &PipelineRun) {
        self.inner.write().await.run = Some(run.clone());
    }

    pub(crate) async fn publish_plan(&self, plan: PlanSummary) {
        self.inner.write().await.last_plan = Some(plan);
    }

    pub async fn run(&self) -> Option<PipelineRun> {
        self.inner.read().await.run.clone()
    }

    pub async fn last_plan(&self) -> Option<PlanSummary> {
        self.inner.read().await.last_plan.clone()
    }

    pub(crate) async fn snapshot(&self, safety: SafetyStatus) -> StatusSnapshot {
        let board = self.inner.read().await;
        StatusSnapshot {
            pipeline: board.run.clone(),
            safety,
            last_plan: board.last_plan.clone(),
        }
    }
}
