use std::time::Duration;

/// Retry delay policy. Attempt counts are owned by each task
/// (`max_retries + 1`); a strategy can only shorten them.
pub trait RetryStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before the attempt following `attempt` (1-based). `None` stops
    /// retrying.
    fn next_delay(&self, attempt: u32, error: &str) -> Option<Duration>;

    fn should_retry(&self, _attempt: u32, error: &str) -> bool {
        !self.is_fatal_error(error)
    }

    fn is_fatal_error(&self, _error: &str) -> bool {
        false
    }
}

/// Retry right away.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateRetry;

impl RetryStrategy for ImmediateRetry {
    fn name(&self) -> &str {
        "immediate"
    }

    fn next_delay(&self, _attempt: u32, _error: &str) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}
