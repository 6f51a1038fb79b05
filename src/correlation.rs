//! Ambient correlation/causation state that flows across asynchronous
//! suspension points within a task.
//!
//! Rust has no hidden "logical thread-local" primitive for async code,
//! so this is modeled the way `tracing`'s own span stack is: a
//! thread-local stack of `CorrelationState`, pushed by `begin_scope`
//! and popped by the `Drop` impl of the guard it returns. Holding the
//! guard across `.await` points propagates the scope into continuations
//! the same way an entered `tracing::Span` does.

use std::cell::RefCell;

use crate::message::{CausationId, CorrelationId, Message, MessageId};

thread_local! {
    static SCOPE_STACK: RefCell<Vec<CorrelationState>> = const { RefCell::new(Vec::new()) };
}

/// Immutable `(correlation_id, message_id)` pair describing the active
/// logical flow. Stackable: nested scopes shadow their parent and are
/// restored when the inner scope's guard drops.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CorrelationState {
    pub correlation_id: Option<CorrelationId>,
    pub message_id: Option<MessageId>,
}

/// RAII handle returned by `begin_scope`. Restores the prior scope
/// exactly when dropped.
#[must_use = "dropping this guard immediately ends the correlation scope"]
pub struct ScopeGuard {
    _private: (),
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Push a new correlation scope; the prior scope is restored when the
/// returned guard is dropped.
pub fn begin_scope(correlation_id: Option<CorrelationId>, message_id: Option<MessageId>) -> ScopeGuard {
    SCOPE_STACK.with(|stack| {
        stack.borrow_mut().push(CorrelationState { correlation_id, message_id });
    });
    ScopeGuard { _private: () }
}

/// Push a scope derived from a message: `correlation_id` is the
/// message's own correlation id if present and non-empty, else the
/// message's id; `message_id` (used as the causation source for
/// children) is always the message's own id.
pub fn begin_scope_for(message: &Message) -> ScopeGuard {
    let correlation_id = match &message.correlation_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => message.id.to_string(),
    };
    begin_scope(Some(correlation_id), Some(message.id))
}

/// The currently active correlation state, or the empty default if no
/// scope is active.
pub fn current() -> CorrelationState {
    SCOPE_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
}

/// The currently active correlation id, if any.
pub fn current_correlation_id() -> Option<CorrelationId> {
    current().correlation_id
}

/// The currently active message id, if any.
pub fn current_message_id() -> Option<MessageId> {
    current().message_id
}

/// Render `message`'s correlation chain as `Correlation=X → Causation=Y
/// → Message=Z`, omitting empty components. The message component is
/// always present.
pub fn correlation_chain(message: &Message) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(correlation_id) = &message.correlation_id {
        if !correlation_id.is_empty() {
            parts.push(format!("Correlation={correlation_id}"));
        }
    }
    if let Some(causation_id) = &message.causation_id {
        if !causation_id.is_empty() {
            parts.push(format!("Causation={causation_id}"));
        }
    }
    parts.push(format!("Message={}", message.id));
    parts.join(" → ")
}

/// Extension trait applying the active correlation scope to a message.
pub trait WithCorrelation {
    /// Stamp `self` with the active scope's correlation id (new
    /// `correlation_id`) and the scope's message id (new
    /// `causation_id`), preserving the original `message_id`. If no
    /// scope is active, or the scope's correlation id is empty, the
    /// message is returned unchanged.
    fn with_correlation(self) -> Self;
}

impl WithCorrelation for Message {
    fn with_correlation(self) -> Self {
        let scope = current();
        match scope.correlation_id {
            Some(correlation_id) if !correlation_id.is_empty() => {
                let causation_id = scope.message_id.map(|id| id.to_string());
                self.with_correlation_ids(Some(correlation_id), causation_id)
            }
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn scope_is_visible_while_active_and_restored_after_drop() {
        assert_eq!(current(), CorrelationState::default());

        {
            let msg_id = MessageId::new();
            let _guard = begin_scope(Some("corr-1".into()), Some(msg_id));
            assert_eq!(current_correlation_id(), Some("corr-1".to_string()));
            assert_eq!(current_message_id(), Some(msg_id));
        }

        assert_eq!(current(), CorrelationState::default());
    }

    #[test]
    fn nested_scopes_restore_parent_exactly() {
        let outer_id = MessageId::new();
        let _outer = begin_scope(Some("outer".into()), Some(outer_id));
        {
            let inner_id = MessageId::new();
            let _inner = begin_scope(Some("inner".into()), Some(inner_id));
            assert_eq!(current_correlation_id(), Some("inner".to_string()));
        }
        assert_eq!(current_correlation_id(), Some("outer".to_string()));
        assert_eq!(current_message_id(), Some(outer_id));
    }

    #[test]
    fn correlation_chain_through_three_messages() {
        let a = Message::command("A", vec![]);
        assert_eq!(correlation_chain(&a), format!("Message={}", a.id));

        let _scope_a = begin_scope_for(&a);
        let b = Message::command("B", vec![]).with_correlation();
        assert_eq!(b.correlation_id, Some(a.id.to_string()));
        assert_eq!(b.causation_id, Some(a.id.to_string()));

        let _scope_b = begin_scope_for(&b);
        let c = Message::command("C", vec![]).with_correlation();
        assert_eq!(c.correlation_id, Some(a.id.to_string()), "correlation carries the workflow id");
        assert_eq!(c.causation_id, Some(b.id.to_string()), "causation is the direct cause");
    }

    #[test]
    fn with_correlation_is_noop_without_active_scope() {
        let msg = Message::command("standalone", vec![]);
        let before_id = msg.id;
        let after = msg.with_correlation();
        assert_eq!(after.id, before_id);
        assert!(after.correlation_id.is_none());
    }
}
