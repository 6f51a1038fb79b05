//! Retry decorator: re-invokes the inner handler with jittered
//! exponential backoff, retrying only transient failures.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::{HeroMessagingError, Result};
use crate::message::Message;

use super::{Handler, ProcessingContext, ProcessingResult};

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::constants::DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay: crate::constants::DEFAULT_RETRY_BASE_DELAY,
            factor: crate::constants::DEFAULT_RETRY_FACTOR,
            max_delay: crate::constants::DEFAULT_RETRY_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Backoff for the given zero-based attempt number, before jitter.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

pub struct RetryDecorator {
    inner: Arc<dyn Handler>,
    config: RetryConfig,
}

impl RetryDecorator {
    pub fn new(inner: Arc<dyn Handler>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.config.jitter || delay.is_zero() {
            return delay;
        }
        let mut rng = rand::rng();
        let millis = delay.as_millis().max(1) as u64;
        Duration::from_millis(rng.random_range(0..=millis))
    }
}

#[async_trait::async_trait]
impl Handler for RetryDecorator {
    async fn handle(&self, message: &Message, ctx: &mut ProcessingContext) -> Result<ProcessingResult> {
        let mut attempt = 0u32;
        loop {
            match self.inner.handle(message, ctx).await {
                Ok(result) => return Ok(result),
                Err(error) if error.is_retryable() && attempt + 1 < self.config.max_attempts => {
                    attempt += 1;
                    ctx.retry_count = attempt;
                    let delay = self.jittered(self.config.backoff_for(attempt - 1));
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyHandler {
        failures_remaining: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Handler for FlakyHandler {
        async fn handle(&self, _message: &Message, _ctx: &mut ProcessingContext) -> Result<ProcessingResult> {
            if self.failures_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
                Err(HeroMessagingError::retryable("transient backend error"))
            } else {
                Ok(ProcessingResult::ok())
            }
        }
    }

    struct AlwaysTerminal;

    #[async_trait::async_trait]
    impl Handler for AlwaysTerminal {
        async fn handle(&self, _message: &Message, _ctx: &mut ProcessingContext) -> Result<ProcessingResult> {
            Err(HeroMessagingError::terminal("unrecoverable"))
        }
    }

    fn fast_config() -> RetryConfig {
        RetryConfig { max_attempts: 5, base_delay: Duration::from_millis(1), factor: 1.0, max_delay: Duration::from_millis(2), jitter: false }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let handler = Arc::new(FlakyHandler { failures_remaining: AtomicU32::new(2) });
        let decorator = RetryDecorator::new(handler, fast_config());
        let message = Message::command("order.place", vec![]);
        let mut ctx = ProcessingContext::new("orders");
        let result = decorator.handle(&message, &mut ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(ctx.retry_count, 2);
    }

    #[tokio::test]
    async fn terminal_failures_are_not_retried() {
        let decorator = RetryDecorator::new(Arc::new(AlwaysTerminal), fast_config());
        let message = Message::command("order.place", vec![]);
        let mut ctx = ProcessingContext::new("orders");
        let result = decorator.handle(&message, &mut ctx).await;
        assert!(matches!(result, Err(HeroMessagingError::TerminalFailure { .. })));
        assert_eq!(ctx.retry_count, 0);
    }

    #[tokio::test]
    async fn exhausting_attempts_rethrows_last_error() {
        let handler = Arc::new(FlakyHandler { failures_remaining: AtomicU32::new(100) });
        let decorator = RetryDecorator::new(handler, RetryConfig { max_attempts: 3, ..fast_config() });
        let message = Message::command("order.place", vec![]);
        let mut ctx = ProcessingContext::new("orders");
        let result = decorator.handle(&message, &mut ctx).await;
        assert!(matches!(result, Err(HeroMessagingError::RetryableFailure { .. })));
        assert_eq!(ctx.retry_count, 2);
    }
}
