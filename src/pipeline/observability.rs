//! Observability decorator: wraps the inner chain in a span, tags it with
//! message type/component/retry count, and always records duration —
//! even when the inner chain throws.

use std::sync::Arc;

use crate::error::Result;
use crate::instrumentation::{Instrumentation, OperationStatus};
use crate::message::Message;
use crate::transport::envelope::TransportEnvelope;

use super::{Handler, ProcessingContext, ProcessingResult};

const OPERATION_NAME: &str = "process_message";

pub struct ObservabilityDecorator {
    inner: Arc<dyn Handler>,
    instrumentation: Arc<dyn Instrumentation>,
}

impl ObservabilityDecorator {
    pub fn new(inner: Arc<dyn Handler>, instrumentation: Arc<dyn Instrumentation>) -> Self {
        Self { inner, instrumentation }
    }
}

#[async_trait::async_trait]
impl Handler for ObservabilityDecorator {
    async fn handle(&self, message: &Message, ctx: &mut ProcessingContext) -> Result<ProcessingResult> {
        let envelope = TransportEnvelope::from_message(message);
        let span = self.instrumentation.start_receive_activity(&envelope, &ctx.component, "pipeline", None, None);

        let outcome = self.inner.handle(message, ctx).await;
        let status = match &outcome {
            Ok(result) if result.success => OperationStatus::Success,
            _ => OperationStatus::Failure,
        };

        self.instrumentation.record_operation(&ctx.component, OPERATION_NAME, status);
        self.instrumentation.record_receive_duration(&ctx.component, ctx.elapsed(), status);

        match &outcome {
            Ok(result) if !result.success => {
                self.instrumentation.add_event(
                    &span,
                    "processing_failed",
                    result.message.clone().map(|m| [("reason".to_string(), m)].into_iter().collect()),
                );
            }
            Err(error) => self.instrumentation.record_error(&span, error),
            _ => {}
        }

        outcome
    }
}
