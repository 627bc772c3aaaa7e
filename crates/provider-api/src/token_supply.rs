//! The token-supply collaborator interface.
//!
//! Vendor tokens are minted by an application server, not by the
//! coordinator. The coordinator calls this collaborator whenever a backend
//! channel signals imminent token expiry; how the collaborator obtains the
//! token (HTTP call, local signing, cache) is its own business.

use crate::secret::SecretString;
use crate::types::ChannelKind;
use async_trait::async_trait;
use thiserror::Error;

/// Failure to supply a fresh token.
#[derive(Debug, Error, Clone)]
#[error("Token supply failed: {0}")]
pub struct TokenSupplyError(pub String);

/// Supplies fresh channel tokens for renewal.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    /// Fetch a fresh token for the given backend channel.
    async fn fresh_token(&self, channel: ChannelKind) -> Result<SecretString, TokenSupplyError>;
}
