use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use vigil_core::api::{HandlerContext, HandlerError, HandlerRegistry, TaskHandler};

pub const DEFAULT_PLACEHOLDER_DELAY: Duration = Duration::from_millis(100);

/// Stand-in research handler for sources without a real integration.
///
/// Waits a fixed delay and answers with a payload marked
/// `"placeholder": true` so downstream stages can tell it apart from
/// real data.
#[derive(Debug, Clone)]
pub struct PlaceholderHandler {
    source: String,
    delay: Duration,
}

impl PlaceholderHandler {
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_delay(source, DEFAULT_PLACEHOLDER_DELAY)
    }

    pub fn with_delay(source: impl Into<String>, delay: Duration) -> Self {
        Self {
            source: source.into(),
            delay,
        }
    }
}

#[async_trait]
impl TaskHandler for PlaceholderHandler {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn handle(&self, ctx: HandlerContext) -> Result<Value, HandlerError> {
        tracing::debug!(
            "placeholder research for '{}' ({}), attempt {}",
            ctx.task_id,
            self.source,
            ctx.attempt
        );
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(json!({
            "task": ctx.task_id,
            "name": ctx.task_name,
            "symbol": ctx.request.symbol,
            "source": self.source,
            "sources": ctx.data_sources,
            "dependencies": ctx.dependency_outputs.keys().collect::<Vec<_>>(),
            "placeholder": true,
        }))
    }
}

/// Register a [`PlaceholderHandler`] for every source not yet covered.
pub fn register_placeholders<'a, I>(registry: &mut HandlerRegistry, sources: I, delay: Duration)
where
    I: IntoIterator<Item = &'a str>,
{
    for source in sources {
        if !registry.contains(source) {
            registry.register(source, Arc::new(PlaceholderHandler::with_delay(source, delay)));
        }
    }
}
