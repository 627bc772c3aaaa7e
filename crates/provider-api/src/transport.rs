//! The `MediaTransport` capability trait.

use crate::error::BackendError;
use crate::types::{
    MediaRelayConfig, ProviderCredentials, RoomId, StreamLayout, StreamPushConfig, UserId, UserRole,
};
use async_trait::async_trait;
use std::time::Duration;

/// Real-time media transport capability of a provider backend.
///
/// Implementations wrap a vendor RTC SDK. All methods take `&self`;
/// implementations manage their own interior state so the coordinator can
/// hold the backend behind an `Arc` and call it from spawned operations.
///
/// Volume levels arrive pre-clamped to `0..=100` by the coordinator.
/// Optional capabilities (stream push, media relay, volume indicator) that a
/// vendor does not support should return [`BackendError::Unsupported`]; the
/// factory additionally reports them up front via
/// [`crate::factory::ProviderCapabilities`].
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Initialize the vendor SDK with application credentials.
    ///
    /// Must complete before any other call; other methods return
    /// [`BackendError::NotInitialized`] otherwise.
    async fn initialize(&self, credentials: &ProviderCredentials) -> Result<(), BackendError>;

    /// Create a room without joining it.
    async fn create_room(&self, room: &RoomId) -> Result<(), BackendError>;

    /// Join a room as `user` with the given role.
    ///
    /// `token` is `None` for vendor projects without certificate-based
    /// authentication.
    async fn join_room(
        &self,
        room: &RoomId,
        user: &UserId,
        role: UserRole,
        token: Option<&str>,
    ) -> Result<(), BackendError>;

    /// Leave the currently joined room.
    async fn leave_room(&self) -> Result<(), BackendError>;

    /// Switch the local user's role within the joined room.
    async fn switch_role(&self, role: UserRole) -> Result<(), BackendError>;

    /// Mute or unmute the local microphone.
    async fn mute_local_audio(&self, muted: bool) -> Result<(), BackendError>;

    /// Stop publishing the local audio stream.
    async fn stop_local_audio_stream(&self) -> Result<(), BackendError>;

    /// Resume publishing the local audio stream.
    async fn resume_local_audio_stream(&self) -> Result<(), BackendError>;

    /// Set the audio mixing volume (`0..=100`).
    async fn set_audio_mixing_volume(&self, volume: u8) -> Result<(), BackendError>;

    /// Set the playback signal volume (`0..=100`).
    async fn set_playback_signal_volume(&self, volume: u8) -> Result<(), BackendError>;

    /// Set the recording signal volume (`0..=100`).
    async fn set_recording_signal_volume(&self, volume: u8) -> Result<(), BackendError>;

    /// Enable periodic volume sample reporting at the given cadence.
    ///
    /// While enabled the backend emits
    /// [`crate::events::ProviderEvent::VolumeReport`] events.
    async fn enable_volume_indicator(&self, interval: Duration) -> Result<(), BackendError>;

    /// Disable volume sample reporting.
    async fn disable_volume_indicator(&self) -> Result<(), BackendError>;

    /// Start pushing a transcoded stream to an external endpoint.
    async fn start_stream_push(&self, config: &StreamPushConfig) -> Result<(), BackendError>;

    /// Stop the outbound transcoded stream.
    async fn stop_stream_push(&self) -> Result<(), BackendError>;

    /// Update the layout of the running transcoded stream.
    async fn update_stream_push_layout(&self, layout: &StreamLayout) -> Result<(), BackendError>;

    /// Start relaying media from the source channel to the destinations.
    async fn start_media_relay(&self, config: &MediaRelayConfig) -> Result<(), BackendError>;

    /// Replace the destination set of a running relay.
    async fn update_media_relay(&self, config: &MediaRelayConfig) -> Result<(), BackendError>;

    /// Pause relaying into one destination channel.
    async fn pause_media_relay(&self, channel: &str) -> Result<(), BackendError>;

    /// Resume relaying into one destination channel.
    async fn resume_media_relay(&self, channel: &str) -> Result<(), BackendError>;

    /// Stop the relay session and tear down all destination legs.
    async fn stop_media_relay(&self) -> Result<(), BackendError>;

    /// Renew the media channel token before it expires.
    async fn renew_token(&self, token: &str) -> Result<(), BackendError>;
}
