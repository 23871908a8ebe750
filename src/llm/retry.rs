//! Bounded exponential-backoff retry wrapper.
//!
//! Wraps any [`CompletionService`] and retries calls that fail with a
//! transient overload condition. All other errors propagate immediately.
//! This is the only place in the crate that automatically retries.

use super::{CompletionService, ImageData};
use crate::Result;
use std::time::Duration;

/// Retry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Initial backoff delay; doubles each retry.
    pub initial_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryConfig {
    /// Builds retry settings from the LLM config section.
    #[must_use]
    pub fn from_config(config: &crate::config::LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(max_retries) = config.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(initial_delay_ms) = config.initial_delay_ms {
            settings.initial_delay = Duration::from_millis(initial_delay_ms);
        }
        settings
    }
}

/// Base backoff delay for a zero-indexed retry attempt (no jitter).
#[must_use]
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(2u32.saturating_pow(attempt))
}

/// Applies a jitter factor in `[0, 0.5)` to a base delay.
#[must_use]
pub fn with_jitter(delay: Duration, jitter: f64) -> Duration {
    delay.mul_f64(1.0 + jitter.clamp(0.0, 0.5))
}

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Completion client wrapper with bounded exponential-backoff retry.
pub struct RetryingClient<C: CompletionService> {
    inner: C,
    config: RetryConfig,
    sleeper: Sleeper,
}

impl<C: CompletionService> RetryingClient<C> {
    /// Creates a new retrying wrapper.
    #[must_use]
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            sleeper: Box::new(std::thread::sleep),
        }
    }

    /// Replaces the sleep function (tests).
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    fn execute<T>(&self, operation: &'static str, call: impl Fn() -> Result<T>) -> Result<T> {
        let provider = self.inner.name();
        let mut retries = 0;

        loop {
            metrics::counter!(
                "llm_requests_total",
                "provider" => provider,
                "operation" => operation
            )
            .increment(1);

            match call() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retries < self.config.max_retries => {
                    let base = backoff_delay(self.config.initial_delay, retries);
                    let delay = with_jitter(base, rand::random::<f64>() * 0.5);
                    retries += 1;
                    metrics::counter!(
                        "llm_retries_total",
                        "provider" => provider,
                        "operation" => operation
                    )
                    .increment(1);
                    tracing::warn!(
                        provider,
                        operation,
                        retry = retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Transient backend overload, backing off"
                    );
                    (self.sleeper)(delay);
                },
                Err(err) => {
                    if err.is_transient() {
                        tracing::error!(provider, operation, "Retries exhausted");
                    }
                    return Err(err);
                },
            }
        }
    }
}

impl<C: CompletionService> CompletionService for RetryingClient<C> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn generate(&self, prompt: &str, images: &[ImageData]) -> Result<String> {
        self.execute("generate", || self.inner.generate(prompt, images))
    }
}
