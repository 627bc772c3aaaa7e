//! The `Messaging` capability trait.

use crate::error::BackendError;
use crate::types::{ProviderCredentials, UserId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Real-time messaging capability of a provider backend.
///
/// Implementations wrap a vendor RTM SDK: login/logout, channel membership,
/// peer and channel messages, user/channel attributes, and presence.
/// Connection-state changes, incoming messages, and token expiry warnings
/// are reported through [`crate::events::ProviderEvent`].
#[async_trait]
pub trait Messaging: Send + Sync {
    /// Initialize the vendor SDK with application credentials.
    async fn initialize(&self, credentials: &ProviderCredentials) -> Result<(), BackendError>;

    /// Log in as `user`, establishing the messaging identity.
    ///
    /// `token` is `None` for vendor projects without certificate-based
    /// authentication.
    async fn login(&self, user: &UserId, token: Option<&str>) -> Result<(), BackendError>;

    /// Log out the current messaging identity.
    async fn logout(&self) -> Result<(), BackendError>;

    /// Whether a messaging identity is currently logged in.
    async fn is_logged_in(&self) -> bool;

    /// Create a messaging channel without joining it.
    async fn create_channel(&self, name: &str) -> Result<(), BackendError>;

    /// Join a messaging channel.
    async fn join_channel(&self, name: &str) -> Result<(), BackendError>;

    /// Leave a messaging channel.
    async fn leave_channel(&self, name: &str) -> Result<(), BackendError>;

    /// List the members of a channel.
    async fn channel_members(&self, name: &str) -> Result<Vec<UserId>, BackendError>;

    /// Count the members of a channel.
    async fn channel_member_count(&self, name: &str) -> Result<usize, BackendError>;

    /// Send a message to a single peer.
    async fn send_peer_message(&self, to: &UserId, payload: &str) -> Result<(), BackendError>;

    /// Send a message to a channel.
    async fn send_channel_message(&self, channel: &str, payload: &str)
        -> Result<(), BackendError>;

    /// Set attributes on the logged-in user.
    async fn set_user_attributes(
        &self,
        attributes: &HashMap<String, String>,
    ) -> Result<(), BackendError>;

    /// Get the attributes of a user.
    async fn user_attributes(
        &self,
        user: &UserId,
    ) -> Result<HashMap<String, String>, BackendError>;

    /// Delete attributes of the logged-in user by key.
    async fn delete_user_attributes(&self, keys: &[String]) -> Result<(), BackendError>;

    /// Set attributes on a channel.
    async fn set_channel_attributes(
        &self,
        channel: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<(), BackendError>;

    /// Get the attributes of a channel.
    async fn channel_attributes(
        &self,
        channel: &str,
    ) -> Result<HashMap<String, String>, BackendError>;

    /// Delete attributes of a channel by key.
    async fn delete_channel_attributes(
        &self,
        channel: &str,
        keys: &[String],
    ) -> Result<(), BackendError>;

    /// Query the current online status of a set of peers.
    async fn query_online_status(
        &self,
        users: &[UserId],
    ) -> Result<HashMap<UserId, bool>, BackendError>;

    /// Subscribe to online-status changes of a set of peers.
    ///
    /// Changes arrive as [`crate::events::ProviderEvent::PeerOnlineStatus`].
    async fn subscribe_online_status(&self, users: &[UserId]) -> Result<(), BackendError>;

    /// Renew the messaging channel token before it expires.
    async fn renew_token(&self, token: &str) -> Result<(), BackendError>;
}
