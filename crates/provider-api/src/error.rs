//! Backend error type.
//!
//! Every fallible call on the capability traits returns [`BackendError`].
//! The coordinator wraps these unchanged for callers; teardown paths log
//! them and complete local cleanup regardless.

use thiserror::Error;

/// Failure reported by a provider backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The active provider pair does not support this operation.
    #[error("Operation not supported by provider: {0}")]
    Unsupported(&'static str),

    /// Network-level failure between the backend and the vendor service.
    #[error("Network error: {0}")]
    Network(String),

    /// The vendor service rejected the request with a vendor error code.
    #[error("Rejected by provider (code {code}): {reason}")]
    Rejected { code: i32, reason: String },

    /// The backend call did not complete in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The backend was used before `initialize` completed.
    #[error("Provider not initialized")]
    NotInitialized,
}

impl BackendError {
    /// Returns a short machine-readable kind for logging and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            BackendError::Unsupported(_) => "unsupported",
            BackendError::Network(_) => "network",
            BackendError::Rejected { .. } => "rejected",
            BackendError::Timeout(_) => "timeout",
            BackendError::NotInitialized => "not_initialized",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_detail() {
        let err = BackendError::Network("socket reset".to_string());
        assert!(err.to_string().contains("socket reset"));

        let err = BackendError::Rejected {
            code: 17,
            reason: "room is full".to_string(),
        };
        assert!(err.to_string().contains("17"));
        assert!(err.to_string().contains("room is full"));
    }

    #[test]
    fn test_kind_labels_are_stable() {
        assert_eq!(BackendError::NotInitialized.kind(), "not_initialized");
        assert_eq!(BackendError::Unsupported("relay").kind(), "unsupported");
        assert_eq!(BackendError::Timeout("join".to_string()).kind(), "timeout");
    }
}
