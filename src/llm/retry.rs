// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retry logic for inference calls with exponential backoff

use crate::config::settings::ResilienceConfig;
use crate::error::{ApiError, ChainsmithError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay in milliseconds (exponentially increased)
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Jitter percentage (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: 0.0,
        }
    }

    /// Calculate delay for a given attempt number
    fn calculate_delay(&self, attempt: u32) -> Duration {
        // base * 2^attempt, saturating so large attempt counts stay capped
        let exponential_ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped_ms = exponential_ms.min(self.max_delay_ms);

        let jitter_range = (capped_ms as f64 * self.jitter) as i64;
        let jitter_ms = if jitter_range > 0 {
            rand::rng().random_range(-jitter_range..=jitter_range)
        } else {
            0
        };

        let final_ms = (capped_ms as i64 + jitter_ms).max(0) as u64;
        Duration::from_millis(final_ms)
    }
}

/// Determine if an error is worth retrying
pub fn is_retryable(error: &ChainsmithError) -> bool {
    match error {
        ChainsmithError::Api(api_error) => match api_error {
            ApiError::Network(_) => true,
            ApiError::Timeout => true,
            ApiError::ServerError { status, .. } => (500..600).contains(status),
            ApiError::StreamError(_) => true,

            ApiError::ModelNotFound(_) => false,
            ApiError::InvalidResponse(_) => false,
        },
        _ => false,
    }
}

/// Retry an async operation with exponential backoff
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    tracing::debug!(operation = operation_name, %error, "non-retryable error");
                    return Err(error);
                }

                if attempt >= config.max_retries {
                    tracing::warn!(
                        operation = operation_name,
                        retries = config.max_retries,
                        %error,
                        "retries exhausted"
                    );
                    return Err(error);
                }

                let delay = config.calculate_delay(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max = config.max_retries,
                    %error,
                    "retrying in {:.1}s",
                    delay.as_secs_f64()
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 5,
            max_delay_ms: 20,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_retry_config_default_matches_settings() {
        let config = RetryConfig::default();
        let resilience = ResilienceConfig::default();
        assert_eq!(config.max_retries, resilience.max_retries);
        assert_eq!(config.base_delay_ms, resilience.base_delay_ms);
    }

    #[test]
    fn test_calculate_delay() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            jitter: 0.0,
        };

        assert_eq!(config.calculate_delay(0).as_millis(), 500);
        assert_eq!(config.calculate_delay(1).as_millis(), 1000);
        assert_eq!(config.calculate_delay(2).as_millis(), 2000);
        assert_eq!(config.calculate_delay(3).as_millis(), 4000);
        // Capped
        assert_eq!(config.calculate_delay(10).as_millis(), 4000);
        assert_eq!(config.calculate_delay(80).as_millis(), 4000);
    }

    #[test]
    fn test_calculate_delay_with_jitter_stays_in_range() {
        let config = RetryConfig {
            max_retries: 1,
            base_delay_ms: 1000,
            max_delay_ms: 1000,
            jitter: 0.25,
        };
        for _ in 0..50 {
            let ms = config.calculate_delay(0).as_millis();
            assert!((750..=1250).contains(&ms));
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&ChainsmithError::Api(ApiError::Network(
            "refused".to_string()
        ))));
        assert!(is_retryable(&ChainsmithError::Api(ApiError::Timeout)));
        assert!(is_retryable(&ChainsmithError::Api(ApiError::ServerError {
            status: 503,
            message: "loading model".to_string(),
        })));

        assert!(!is_retryable(&ChainsmithError::Api(ApiError::ServerError {
            status: 400,
            message: "bad request".to_string(),
        })));
        assert!(!is_retryable(&ChainsmithError::Api(
            ApiError::ModelNotFound("x".to_string())
        )));
        assert!(!is_retryable(&ChainsmithError::Template(
            "missing".to_string()
        )));
    }

    #[tokio::test]
    async fn test_with_retry_success_after_retries() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(
            || async {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(ChainsmithError::Api(ApiError::Timeout))
                } else {
                    Ok(42)
                }
            },
            &fast(),
            "test_operation",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(
            || async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(ChainsmithError::Api(ApiError::ModelNotFound(
                    "nope".to_string(),
                )))
            },
            &fast(),
            "test_operation",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_retries() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(
            || async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(ChainsmithError::Api(ApiError::Network("down".to_string())))
            },
            &fast(),
            "test_operation",
        )
        .await;

        assert!(result.is_err());
        // Initial attempt plus three retries
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_with_retry_none_config_tries_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(
            || async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(ChainsmithError::Api(ApiError::Timeout))
            },
            &RetryConfig::none(),
            "test_operation",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
