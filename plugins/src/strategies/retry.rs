use std::time::Duration;

use vigil_core::api::{RetryConfig, RetryStrategy};

/// Error fragments that make retrying pointless.
#[derive(Debug, Clone, Default)]
struct FatalPatterns(Vec<String>);

impl FatalPatterns {
    fn matches(&self, error: &str) -> bool {
        self.0.iter().any(|p| error.contains(p.as_str()))
    }
}

pub struct ExponentialBackoffRetry {
    config: RetryConfig,
    fatal: FatalPatterns,
}

pub struct LinearBackoffRetry {
    config: RetryConfig,
    fatal: FatalPatterns,
}

impl ExponentialBackoffRetry {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            fatal: FatalPatterns::default(),
        }
    }

    pub fn with_fatal_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.fatal.0.push(pattern.into());
        self
    }
}

impl LinearBackoffRetry {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            fatal: FatalPatterns::default(),
        }
    }

    pub fn with_fatal_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.fatal.0.push(pattern.into());
        self
    }
}

impl RetryStrategy for ExponentialBackoffRetry {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        let exp = 1u64 << attempt.saturating_sub(1).min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn is_fatal_error(&self, error: &str) -> bool {
        self.fatal.matches(error)
    }
}

impl RetryStrategy for LinearBackoffRetry {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        let multiplier = attempt.max(1) as u64;
        let delay = self.config.base_delay_ms.saturating_mul(multiplier);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn is_fatal_error(&self, error: &str) -> bool {
        self.fatal.matches(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(base: u64, max: u64, strategy: &str) -> RetryConfig {
        RetryConfig {
            strategy: strategy.to_string(),
            base_delay_ms: base,
            max_delay_ms: max,
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let plugin = ExponentialBackoffRetry::new(cfg(100, 1000, "exponential-backoff"));
        assert_eq!(plugin.next_delay(1, "err").unwrap().as_millis(), 100);
        assert_eq!(plugin.next_delay(2, "err").unwrap().as_millis(), 200);
        assert_eq!(plugin.next_delay(3, "err").unwrap().as_millis(), 400);
        assert_eq!(plugin.next_delay(8, "err").unwrap().as_millis(), 1000);
    }

    #[test]
    fn test_linear_backoff() {
        let plugin = LinearBackoffRetry::new(cfg(50, 200, "linear"));
        assert_eq!(plugin.next_delay(1, "err").unwrap().as_millis(), 50);
        assert_eq!(plugin.next_delay(3, "err").unwrap().as_millis(), 150);
        assert_eq!(plugin.next_delay(9, "err").unwrap().as_millis(), 200);
    }

    #[test]
    fn test_fatal_patterns_stop_retries() {
        let plugin = LinearBackoffRetry::new(cfg(50, 200, "linear")).with_fatal_pattern("401");
        assert!(!plugin.should_retry(1, "handler failed: HTTP 401 unauthorized"));
        assert!(plugin.should_retry(1, "source unavailable: timeout"));
    }
}
