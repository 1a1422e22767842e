//! Error types returned by remote services.

use crate::id::EntityId;
use thiserror::Error;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure of a single remote call.
///
/// Stores treat every variant the same way (revert and log). The tags exist
/// so that callers observing outcomes can tell transient failures from
/// terminal ones.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the call can be retried.
        retryable: bool,
    },

    /// The service refused the request (validation, permissions).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The target entity does not exist on the service.
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// The service failed while handling the request.
    #[error("server error: {0}")]
    Server(String),

    /// The call did not complete in time.
    #[error("remote call timed out")]
    Timeout,
}

impl RemoteError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if repeating the call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport { retryable, .. } => *retryable,
            RemoteError::Timeout => true,
            RemoteError::Server(_) => true,
            RemoteError::Rejected(_) | RemoteError::NotFound(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(RemoteError::transport_retryable("connection reset").is_retryable());
        assert!(!RemoteError::transport_fatal("bad certificate").is_retryable());
        assert!(RemoteError::Timeout.is_retryable());
        assert!(RemoteError::Server("internal".into()).is_retryable());
        assert!(!RemoteError::Rejected("title too long".into()).is_retryable());
        assert!(!RemoteError::NotFound(EntityId::from("n1")).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = RemoteError::NotFound(EntityId::from("goal-9"));
        assert_eq!(err.to_string(), "entity not found: goal-9");

        let err = RemoteError::transport_retryable("offline");
        assert_eq!(err.to_string(), "transport error: offline");
    }
}
