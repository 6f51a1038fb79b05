//! Error types and handling for the HeroMessaging core

use thiserror::Error;

/// Result type alias for HeroMessaging operations
pub type Result<T> = std::result::Result<T, HeroMessagingError>;

/// Main error type for the HeroMessaging core.
///
/// Variants follow the taxonomy in the reliability/pipeline design:
/// structural violations throw `InvalidArgument`, lifecycle violations
/// throw `InvalidState`, and storage "not found" cases are surfaced as
/// `bool`/`Option` sentinels by callers rather than this error — see
/// the `queue`, `reliability`, and `transport` modules.
#[derive(Error, Debug)]
pub enum HeroMessagingError {
    /// Precondition violation: null/empty argument, non-power-of-two
    /// buffer size, out-of-range batch count, and similar.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violated precondition
        message: String,
    },

    /// Operation illegal in the component's current lifecycle state
    /// (e.g. `Send` on a disconnected transport, duplicate consumer id).
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the state is illegal
        message: String,
    },

    /// Referenced entity (queue, outbox/inbox entry, consumer) does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was not found
        message: String,
    },

    /// A handler or transport operation failed transiently; the retry
    /// decorator should absorb this and re-invoke the inner handler.
    #[error("retryable failure: {message}")]
    RetryableFailure {
        /// Description of the transient failure
        message: String,
    },

    /// Retries against this operation are exhausted; the failure is final.
    #[error("terminal failure: {message}")]
    TerminalFailure {
        /// Description of the terminal failure
        message: String,
    },

    /// A principal could not be authenticated.
    #[error("authentication failure: {reason}")]
    AuthenticationFailure {
        /// Reason authentication failed
        reason: String,
    },

    /// A principal was authenticated but lacks permission for the operation.
    #[error("authorization failure: {reason}")]
    AuthorizationFailure {
        /// Reason authorization was denied
        reason: String,
    },

    /// The operation was interrupted by a cancellation signal; any
    /// partial state change has been rolled back.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation timed out waiting for a condition (e.g. a ring
    /// buffer sequence becoming available, or a simulated connect delay).
    #[error("operation timed out")]
    Timeout,

    /// Message (de)serialization failed at a transport boundary.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure
        message: String,
    },

    /// Generic error for conditions not expected to occur in a
    /// correctly functioning system (a logic error in the core itself).
    #[error("unexpected error: {message}")]
    Unexpected {
        /// Description of the unexpected condition
        message: String,
    },
}

impl HeroMessagingError {
    /// Create a new invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Create a new invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Create a new not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Create a new retryable-failure error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::RetryableFailure { message: message.into() }
    }

    /// Create a new terminal-failure error
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::TerminalFailure { message: message.into() }
    }

    /// Create a new authentication-failure error
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailure { reason: reason.into() }
    }

    /// Create a new authorization-failure error
    pub fn authorization(reason: impl Into<String>) -> Self {
        Self::AuthorizationFailure { reason: reason.into() }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Create a new unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected { message: message.into() }
    }

    /// Whether the retry decorator should re-invoke the inner handler
    /// for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableFailure { .. } | Self::Timeout)
    }

    /// Whether this failure is final and should not be retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TerminalFailure { .. } | Self::AuthorizationFailure { .. } | Self::AuthenticationFailure { .. }
        )
    }
}

/// Convenience macro for creating invalid-argument errors
#[macro_export]
macro_rules! invalid_argument {
    ($($arg:tt)*) => {
        $crate::error::HeroMessagingError::invalid_argument(format!($($arg)*))
    };
}

/// Convenience macro for creating invalid-state errors
#[macro_export]
macro_rules! invalid_state {
    ($($arg:tt)*) => {
        $crate::error::HeroMessagingError::invalid_state(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = HeroMessagingError::invalid_argument("bad batch count");
        assert!(matches!(err, HeroMessagingError::InvalidArgument { .. }));
    }

    #[test]
    fn test_error_classification() {
        let retryable = HeroMessagingError::retryable("connection reset");
        assert!(retryable.is_retryable());
        assert!(!retryable.is_terminal());

        let terminal = HeroMessagingError::terminal("retries exhausted");
        assert!(!terminal.is_retryable());
        assert!(terminal.is_terminal());

        let timeout = HeroMessagingError::Timeout;
        assert!(timeout.is_retryable());
    }

    #[test]
    fn test_error_macros() {
        let err = invalid_argument!("size {} is not a power of two", 7);
        assert!(matches!(err, HeroMessagingError::InvalidArgument { .. }));
    }
}
