//! Authorization decorator: consults an `AuthorizationProvider` before
//! letting a message reach the inner chain.

use std::sync::Arc;

use crate::error::Result;
use crate::message::Message;

use super::{Handler, ProcessingContext, ProcessingResult};

/// The action being attempted on a message, as seen by authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Send,
    Receive,
    Handle,
    Publish,
    Subscribe,
}

/// Caller identity consulted by an `AuthorizationProvider`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The principal used when no identity was established upstream.
    pub fn anonymous() -> Self {
        Self { name: "anonymous".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Allowed,
    InsufficientPermissions,
    Forbidden,
}

#[async_trait::async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn authorize(&self, principal: &Principal, message_type: &str, operation: Operation) -> AuthorizationOutcome;
}

/// Provider that allows everything. Used where authorization is not
/// enforced but the decorator still needs to be wired for symmetry.
pub struct AllowAllAuthorization;

#[async_trait::async_trait]
impl AuthorizationProvider for AllowAllAuthorization {
    async fn authorize(&self, _principal: &Principal, _message_type: &str, _operation: Operation) -> AuthorizationOutcome {
        AuthorizationOutcome::Allowed
    }
}

pub struct AuthorizationDecorator {
    inner: Arc<dyn Handler>,
    provider: Arc<dyn AuthorizationProvider>,
    operation: Operation,
}

impl AuthorizationDecorator {
    pub fn new(inner: Arc<dyn Handler>, provider: Arc<dyn AuthorizationProvider>, operation: Operation) -> Self {
        Self { inner, provider, operation }
    }
}

#[async_trait::async_trait]
impl Handler for AuthorizationDecorator {
    async fn handle(&self, message: &Message, ctx: &mut ProcessingContext) -> Result<ProcessingResult> {
        let principal = Principal::anonymous();
        match self.provider.authorize(&principal, &message.message_type, self.operation).await {
            AuthorizationOutcome::Allowed => self.inner.handle(message, ctx).await,
            AuthorizationOutcome::InsufficientPermissions => Ok(ProcessingResult::failure("insufficient permissions")),
            AuthorizationOutcome::Forbidden => Ok(ProcessingResult::failure("forbidden")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DenyAll;

    #[async_trait::async_trait]
    impl AuthorizationProvider for DenyAll {
        async fn authorize(&self, _principal: &Principal, _message_type: &str, _operation: Operation) -> AuthorizationOutcome {
            AuthorizationOutcome::Forbidden
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
    async fn denied_operation_never_reaches_inner_handler() {
        let decorator = AuthorizationDecorator::new(Arc::new(EchoHandler), Arc::new(DenyAll), Operation::Handle);
        let message = Message::command("order.place", vec![]);
        let mut ctx = ProcessingContext::new("orders");
        let result = decorator.handle(&message, &mut ctx).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn allow_all_delegates_to_inner_handler() {
        let decorator = AuthorizationDecorator::new(Arc::new(EchoHandler), Arc::new(AllowAllAuthorization), Operation::Handle);
        let message = Message::command("order.place", vec![]);
        let mut ctx = ProcessingContext::new("orders");
        let result = decorator.handle(&message, &mut ctx).await.unwrap();
        assert!(result.success);
    }
}
