//! Coordinator error types.
//!
//! Every propagated error carries a machine-readable kind plus a
//! human-readable detail string. There is no global error handler; each
//! call site decides how to react. Teardown operations (leave, stop,
//! logout) log backend failures and complete local cleanup instead of
//! propagating them.

use provider_api::error::BackendError;
use provider_api::types::ChannelKind;
use thiserror::Error;

/// Coordinator error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Bad or missing provider setup (configure not called, or called
    /// twice without teardown).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation requires a login or room context that is absent.
    #[error("No active session: {0}")]
    NoActiveSession(String),

    /// A conflicting operation is already in flight on the same resource.
    #[error("Operation already in progress: {0}")]
    OperationInProgress(&'static str),

    /// The operation is not valid for the current state-machine state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The operation is not valid for a relay destination channel's state.
    #[error("Invalid state for relay channel '{channel}': {state}")]
    InvalidChannelState {
        /// The destination channel.
        channel: String,
        /// Its current state.
        state: String,
    },

    /// The supplied configuration is invalid (e.g. a relay with no
    /// destination channels).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Wrapped provider failure, propagated unchanged.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Token renewal exhausted its retries; the session is left connected
    /// and the caller decides whether to tear down.
    #[error("Token renewal failed for {} channel after {attempts} attempts", channel.as_str())]
    TokenRenewalFailed {
        /// The channel whose token could not be renewed.
        channel: ChannelKind,
        /// Renewal attempts made before giving up.
        attempts: u32,
    },

    /// Actor mailbox plumbing failure (actor gone or channel closed).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Returns a short machine-readable kind for logging and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::Configuration(_) => "configuration",
            CoordinatorError::NoActiveSession(_) => "no_active_session",
            CoordinatorError::OperationInProgress(_) => "operation_in_progress",
            CoordinatorError::InvalidState(_) => "invalid_state",
            CoordinatorError::InvalidChannelState { .. } => "invalid_channel_state",
            CoordinatorError::InvalidConfiguration(_) => "invalid_configuration",
            CoordinatorError::Backend(_) => "backend",
            CoordinatorError::TokenRenewalFailed { .. } => "token_renewal_failed",
            CoordinatorError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_conversion() {
        let backend = BackendError::Rejected {
            code: 110,
            reason: "invalid token".to_string(),
        };
        let err: CoordinatorError = backend.into();

        assert!(matches!(err, CoordinatorError::Backend(_)));
        assert_eq!(err.kind(), "backend");
        assert!(err.to_string().contains("invalid token"));
    }

    #[test]
    fn test_display_carries_detail() {
        let err = CoordinatorError::InvalidChannelState {
            channel: "side-room".to_string(),
            state: "idle".to_string(),
        };
        assert!(err.to_string().contains("side-room"));
        assert!(err.to_string().contains("idle"));

        let err = CoordinatorError::TokenRenewalFailed {
            channel: ChannelKind::Media,
            attempts: 5,
        };
        assert!(err.to_string().contains("media"));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_kind_labels_are_stable() {
        assert_eq!(
            CoordinatorError::OperationInProgress("join_room").kind(),
            "operation_in_progress"
        );
        assert_eq!(
            CoordinatorError::NoActiveSession("login first".to_string()).kind(),
            "no_active_session"
        );
    }
}
