//! Token suppliers for renewal testing.

use provider_api::secret::SecretString;
use provider_api::token_supply::{TokenSupplier, TokenSupplyError};
use provider_api::types::ChannelKind;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Supplier that always returns the same token and counts requests.
#[derive(Debug)]
pub struct StaticTokenSupplier {
    token: String,
    requests: AtomicU32,
}

impl StaticTokenSupplier {
    /// Create a supplier returning `token` for every channel.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            requests: AtomicU32::new(0),
        }
    }

    /// Create a shared supplier, ready to hand to a coordinator.
    #[must_use]
    pub fn shared(token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(token))
    }

    /// Number of tokens requested so far.
    #[must_use]
    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSupplier for StaticTokenSupplier {
    async fn fresh_token(
        &self,
        _channel: ChannelKind,
    ) -> Result<SecretString, TokenSupplyError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(SecretString::from(self.token.clone()))
    }
}

/// Supplier that always fails, for renewal-exhaustion tests.
#[derive(Debug, Default)]
pub struct FailingTokenSupplier {
    requests: AtomicU32,
}

impl FailingTokenSupplier {
    /// Create a shared failing supplier.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of tokens requested so far.
    #[must_use]
    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSupplier for FailingTokenSupplier {
    async fn fresh_token(
        &self,
        channel: ChannelKind,
    ) -> Result<SecretString, TokenSupplyError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Err(TokenSupplyError(format!(
            "injected supply failure for {} channel",
            channel.as_str()
        )))
    }
}

/// Supplier that fails a fixed number of times before succeeding, for
/// retry/backoff tests.
#[derive(Debug)]
pub struct FlakyTokenSupplier {
    token: String,
    failures_remaining: AtomicU32,
    requests: AtomicU32,
}

impl FlakyTokenSupplier {
    /// Create a supplier that fails the first `failures` requests.
    #[must_use]
    pub fn new(token: impl Into<String>, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            token: token.into(),
            failures_remaining: AtomicU32::new(failures),
            requests: AtomicU32::new(0),
        })
    }

    /// Number of tokens requested so far.
    #[must_use]
    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSupplier for FlakyTokenSupplier {
    async fn fresh_token(
        &self,
        _channel: ChannelKind,
    ) -> Result<SecretString, TokenSupplyError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(TokenSupplyError("injected transient failure".to_string()));
        }
        Ok(SecretString::from(self.token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_supplier_counts_requests() {
        let supplier = StaticTokenSupplier::new("tok");

        assert!(supplier.fresh_token(ChannelKind::Media).await.is_ok());
        assert!(supplier.fresh_token(ChannelKind::Messaging).await.is_ok());
        assert_eq!(supplier.request_count(), 2);
    }

    #[tokio::test]
    async fn test_flaky_supplier_recovers() {
        let supplier = FlakyTokenSupplier::new("tok", 2);

        assert!(supplier.fresh_token(ChannelKind::Media).await.is_err());
        assert!(supplier.fresh_token(ChannelKind::Media).await.is_err());
        assert!(supplier.fresh_token(ChannelKind::Media).await.is_ok());
        assert_eq!(supplier.request_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_supplier_never_succeeds() {
        let supplier = FailingTokenSupplier::shared();

        for _ in 0..5 {
            assert!(supplier.fresh_token(ChannelKind::Media).await.is_err());
        }
        assert_eq!(supplier.request_count(), 5);
    }
}
