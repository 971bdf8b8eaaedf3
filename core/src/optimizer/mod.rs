//! Optimizer fallback selection.
//!
//! The primary strategy, when enabled, gets one attempt under its own
//! timeout. Any failure switches to the fallback for that run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::OptimizerConfig;
use crate::error::StrategyError;

#[async_trait]
pub trait OptimizationStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn optimize(&self, input: &Value) -> Result<Value, StrategyError>;
}

/// Shared result contract of primary and fallback strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub strategy: String,
    pub used_fallback: bool,
    pub payload: Value,
}

#[derive(Clone)]
pub struct FallbackSelector {
    primary: Option<Arc<dyn OptimizationStrategy>>,
    fallback: Arc<dyn OptimizationStrategy>,
    config: OptimizerConfig,
}

impl FallbackSelector {
    pub fn new(fallback: Arc<dyn OptimizationStrategy>, config: OptimizerConfig) -> Self {
        Self {
            primary: None,
            fallback,
            config,
        }
    }

    pub fn with_primary(mut self, primary: Arc<dyn OptimizationStrategy>) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn primary_available(&self) -> bool {
        self.config.primary_enabled && self.primary.is_some()
    }

    pub async fn run(&self, input: &Value) -> Result<OptimizationResult, StrategyError> {
        if let Some(primary) = self.primary.as_ref().filter(|_| self.config.primary_enabled) {
            let timeout = Duration::from_millis(self.config.primary_timeout_ms);
            let outcome = match tokio::time::timeout(timeout, primary.optimize(input)).await {
                Ok(result) => result,
                Err(_) => Err(StrategyError::Timeout(primary.name().to_string())),
            };

            match outcome {
                Ok(payload) => {
                    return Ok(OptimizationResult {
                        strategy: primary.name().to_string(),
                        used_fallback: false,
                        payload,
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        "primary optimizer unavailable, using '{}': {}",
                        self.fallback.name(),
                        e
                    );
                }
            }
        }

        let payload = self.fallback.optimize(input).await?;
        Ok(OptimizationResult {
            strategy: self.fallback.name().to_string(),
            used_fallback: self.primary_available(),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fixed {
        name: &'static str,
        calls: AtomicU32,
        delay: Option<Duration>,
        fail: bool,
    }

    impl Fixed {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: AtomicU32::new(0),
                delay: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl OptimizationStrategy for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn optimize(&self, input: &Value) -> Result<Value, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(StrategyError::Failed {
                    name: self.name.to_string(),
                    message: "solver diverged".into(),
                });
            }
            Ok(json!({ "by": self.name, "input": input }))
        }
    }

    fn config(enabled: bool) -> OptimizerConfig {
        OptimizerConfig {
            primary_enabled: enabled,
            primary_timeout_ms: 50,
        }
    }

    #[tokio::test]
    async fn test_primary_success() {
        let selector = FallbackSelector::new(Arc::new(Fixed::new("heuristic")), config(true))
            .with_primary(Arc::new(Fixed::new("quantum")));
        let result = selector.run(&json!(1)).await.unwrap();
        assert_eq!(result.strategy, "quantum");
        assert!(!result.used_fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_timeout_falls_back_once() {
        let primary = Arc::new(Fixed {
            delay: Some(Duration::from_secs(5)),
            ..Fixed::new("quantum")
        });
        let selector = FallbackSelector::new(Arc::new(Fixed::new("heuristic")), config(true))
            .with_primary(primary.clone());

        let result = selector.run(&json!(1)).await.unwrap();
        assert_eq!(result.strategy, "heuristic");
        assert!(result.used_fallback);
        assert_eq!(result.payload["by"], json!("heuristic"));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back() {
        let primary = Arc::new(Fixed {
            fail: true,
            ..Fixed::new("quantum")
        });
        let selector = FallbackSelector::new(Arc::new(Fixed::new("heuristic")), config(true))
            .with_primary(primary);
        assert!(selector.run(&json!(1)).await.unwrap().used_fallback);
    }

    #[tokio::test]
    async fn test_disabled_primary_is_not_called() {
        let primary = Arc::new(Fixed::new("quantum"));
        let selector = FallbackSelector::new(Arc::new(Fixed::new("heuristic")), config(false))
            .with_primary(primary.clone());
        let result = selector.run(&json!(1)).await.unwrap();
        assert_eq!(result.strategy, "heuristic");
        assert!(!result.used_fallback);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_failure_is_reported() {
        let fallback = Arc::new(Fixed {
            fail: true,
            ..Fixed::new("heuristic")
        });
        let selector = FallbackSelector::new(fallback, config(false));
        assert!(matches!(
            selector.run(&json!(1)).await,
            Err(StrategyError::Failed { .. })
        ));
    }
}
