//! Validation decorator: runs registered validators for the concrete
//! message type; never throws for user validation errors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::message::Message;

use super::{Handler, ProcessingContext, ProcessingResult};

/// Result of running a single validator.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub message: Option<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self { valid: true, message: None }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self { valid: false, message: Some(message.into()) }
    }
}

/// A single message-type-scoped validation rule.
#[async_trait::async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, message: &Message) -> ValidationOutcome;
}

/// Validators keyed by the message type they apply to.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Vec<Arc<dyn Validator>>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, message_type: impl Into<String>, validator: Arc<dyn Validator>) {
        self.validators.entry(message_type.into()).or_default().push(validator);
    }

    pub fn validators_for(&self, message_type: &str) -> &[Arc<dyn Validator>] {
        self.validators.get(message_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct ValidationDecorator {
    inner: Arc<dyn Handler>,
    registry: Arc<ValidatorRegistry>,
}

impl ValidationDecorator {
    pub fn new(inner: Arc<dyn Handler>, registry: Arc<ValidatorRegistry>) -> Self {
        Self { inner, registry }
    }
}

#[async_trait::async_trait]
impl Handler for ValidationDecorator {
    async fn handle(&self, message: &Message, ctx: &mut ProcessingContext) -> Result<ProcessingResult> {
        for validator in self.registry.validators_for(&message.message_type) {
            let outcome = validator.validate(message).await;
            if !outcome.valid {
                return Ok(ProcessingResult::failure(
                    outcome.message.unwrap_or_else(|| "validation failed".to_string()),
                ));
            }
        }
        self.inner.handle(message, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysInvalid;

    #[async_trait::async_trait]
    impl Validator for AlwaysInvalid {
        async fn validate(&self, _message: &Message) -> ValidationOutcome {
            ValidationOutcome::invalid("body must not be empty")
        }
    }

    struct EchoHandler;

    #[async_trait::async_trait]
    impl Handler for EchoHandler {
        async fn handle(&self, _message: &Message, _ctx: &mut ProcessingContext) -> Result<ProcessingResult> {
            Ok(ProcessingResult::ok())
        }
    }

    #[tokio::test]
    async fn failing_validator_short_circuits_without_error() {
        let mut registry = ValidatorRegistry::new();
        registry.register("order.place", Arc::new(AlwaysInvalid));
        let decorator = ValidationDecorator::new(Arc::new(EchoHandler), Arc::new(registry));

        let message = Message::command("order.place", vec![]);
        let mut ctx = ProcessingContext::new("orders");
        let result = decorator.handle(&message, &mut ctx).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("body must not be empty"));
    }

    #[tokio::test]
    async fn unregistered_message_type_passes_through() {
        let decorator = ValidationDecorator::new(Arc::new(EchoHandler), Arc::new(ValidatorRegistry::new()));
        let message = Message::command("unregistered", vec![]);
        let mut ctx = ProcessingContext::new("orders");
        let result = decorator.handle(&message, &mut ctx).await.unwrap();
        assert!(result.success);
    }
}
