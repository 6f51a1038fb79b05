//! Processing pipeline (C9): an ordered chain of decorators wrapping a
//! terminal message handler.
//!
//! Default ordering (outermost first): observability → authorization →
//! validation → retry → handler. Each decorator is itself a [`Handler`]
//! wrapping an inner one, so the chain is just composition — callers may
//! reorder or omit decorators freely.

pub mod authorization;
pub mod observability;
pub mod retry;
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::correlation::CorrelationState;
use crate::error::Result;
use crate::message::Message;

/// Per-message, per-flow mutable state threaded through the chain.
/// Owned by its flow; never shared across messages.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    pub component: String,
    pub retry_count: u32,
    pub started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
    pub correlation: Option<CorrelationState>,
}

impl ProcessingContext {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            retry_count: 0,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            correlation: None,
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

/// Outcome of a pipeline decorator or terminal handler.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub success: bool,
    pub message: Option<String>,
}

impl ProcessingResult {
    pub fn ok() -> Self {
        Self { success: true, message: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()) }
    }
}

/// A pipeline stage: a decorator or the terminal handler. Implementations
/// must be idempotent with respect to context mutation, except for
/// `retry_count`, which only the retry decorator owns.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, message: &Message, ctx: &mut ProcessingContext) -> Result<ProcessingResult>;
}

#[async_trait::async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(&Message, &mut ProcessingContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<ProcessingResult>> + Send,
{
    async fn handle(&self, message: &Message, ctx: &mut ProcessingContext) -> Result<ProcessingResult> {
        self(message, ctx).await
    }
}

/// Builds the default decorator chain (outermost first: observability →
/// authorization → validation → retry → handler) around a terminal
/// handler. Omit a `with_*` call to skip that decorator.
pub struct PipelineBuilder {
    observability: Option<Arc<dyn crate::instrumentation::Instrumentation>>,
    authorization: Option<(Arc<dyn authorization::AuthorizationProvider>, authorization::Operation)>,
    validation: Option<Arc<validation::ValidatorRegistry>>,
    retry: Option<retry::RetryConfig>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self { observability: None, authorization: None, validation: None, retry: None }
    }

    pub fn with_observability(mut self, instrumentation: Arc<dyn crate::instrumentation::Instrumentation>) -> Self {
        self.observability = Some(instrumentation);
        self
    }

    pub fn with_authorization(
        mut self,
        provider: Arc<dyn authorization::AuthorizationProvider>,
        operation: authorization::Operation,
    ) -> Self {
        self.authorization = Some((provider, operation));
        self
    }

    pub fn with_validation(mut self, registry: Arc<validation::ValidatorRegistry>) -> Self {
        self.validation = Some(registry);
        self
    }

    pub fn with_retry(mut self, config: retry::RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    pub fn build(self, terminal: Arc<dyn Handler>) -> Arc<dyn Handler> {
        let mut chain = terminal;
        if let Some(config) = self.retry {
            chain = Arc::new(retry::RetryDecorator::new(chain, config));
        }
        if let Some(registry) = self.validation {
            chain = Arc::new(validation::ValidationDecorator::new(chain, registry));
        }
        if let Some((provider, operation)) = self.authorization {
            chain = Arc::new(authorization::AuthorizationDecorator::new(chain, provider, operation));
        }
        if let Some(instrumentation) = self.observability {
            chain = Arc::new(observability::ObservabilityDecorator::new(chain, instrumentation));
        }
        chain
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait::async_trait]
    impl Handler for EchoHandler {
        async fn handle(&self, _message: &Message, _ctx: &mut ProcessingContext) -> Result<ProcessingResult> {
            Ok(ProcessingResult::ok())
        }
    }

    #[tokio::test]
    async fn empty_pipeline_runs_terminal_handler() {
        let pipeline = PipelineBuilder::new().build(Arc::new(EchoHandler));
        let message = Message::command("order.place", vec![]);
        let mut ctx = ProcessingContext::new("orders");
        let result = pipeline.handle(&message, &mut ctx).await.unwrap();
        assert!(result.success);
    }
}
