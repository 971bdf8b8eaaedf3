use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HandlerError;
use crate::planner::RequestContext;

/// Research handler for one data-source capability.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Run one attempt. The executor bounds the call with the task timeout
    /// and drops the future when it fires.
    async fn handle(&self, ctx: HandlerContext) -> Result<Value, HandlerError>;
}

/// Everything a handler sees for one attempt.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub task_id: String,
    pub task_name: String,
    /// Full source list; the first entry selected this handler.
    pub data_sources: Vec<String>,
    /// 1-based attempt number
    pub attempt: u32,
    pub request: Arc<RequestContext>,
    /// Outputs of completed dependencies, keyed by task id
    pub dependency_outputs: BTreeMap<String, Value>,
}

/// Adapter turning an async closure into a [`TaskHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> FnHandler<F>
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    FnHandler {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: HandlerContext) -> Result<Value, HandlerError> {
        (self.f)(ctx).await
    }
}
