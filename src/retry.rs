//! Bounded retry with an optional continuation predicate.
//!
//! A [`RetryContext`] describes one call site: how many retries it gets,
//! whether an empty (`None`) result counts as a failure, and an optional
//! async predicate consulted before every retry. Attempt counters live in
//! [`RetryContext::invoke`], so one context can guard many calls, including
//! concurrent ones.

use crate::error::PipelineError;
use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of retries (not counting the first attempt).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);

type Continuation = Box<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Retry configuration for a single guarded operation.
pub struct RetryContext {
    name: String,
    max_retries: u32,
    retry_empty: bool,
    initial_backoff: Duration,
    max_backoff: Duration,
    continuation: Option<Continuation>,
}

impl RetryContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_empty: false,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            continuation: None,
        }
    }

    /// Maximum number of retries after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Treat `Ok(None)` as a retryable outcome.
    pub fn retry_empty(mut self, retry_empty: bool) -> Self {
        self.retry_empty = retry_empty;
        self
    }

    /// Exponential backoff bounds. The delay doubles after every retry.
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Predicate checked before each retry; returning `false` stops retrying
    /// even if attempts remain.
    pub fn continue_while<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.continuation = Some(Box::new(move || Box::pin(predicate())));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it yields a usable result or the budget is spent.
    ///
    /// Returns `Ok(None)` only when `retry_empty` is off and the operation
    /// answered with nothing.
    pub async fn invoke<T, F, Fut>(&self, mut op: F) -> Result<Option<T>, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let reason = match op().await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) if !self.retry_empty => return Ok(None),
                Ok(None) => "no result returned".to_string(),
                Err(e) => format!("{:#}", e),
            };

            if attempts > self.max_retries {
                warn!(operation = %self.name, attempts, "Retries exhausted: {}", reason);
                return Err(PipelineError::RetryExhausted {
                    operation: self.name.clone(),
                    attempts,
                    reason,
                });
            }

            if let Some(continuation) = &self.continuation {
                if !continuation().await {
                    debug!(operation = %self.name, attempts, "Continuation declined further retries");
                    return Err(PipelineError::RetryAborted {
                        operation: self.name.clone(),
                        attempts,
                    });
                }
            }

            let delay = self.delay_for(attempts);
            debug!(
                operation = %self.name,
                attempts,
                "Attempt failed ({}), retrying in {:?}",
                reason,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
