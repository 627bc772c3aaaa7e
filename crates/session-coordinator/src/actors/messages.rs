//! Message types for the coordinator mailbox.
//!
//! All interaction with the coordinator actor is strongly-typed message
//! passing over `tokio::sync::mpsc`. Request-reply operations carry a
//! `tokio::sync::oneshot` responder; internal completions from spawned
//! backend operations and renewal tasks arrive as messages too, so every
//! state mutation happens on the actor loop.

use crate::errors::CoordinatorError;
use crate::state::{
    AudioSettings, MediaRelayState, StreamPushState, UserSession, VolumeDetectionConfig,
};
use provider_api::error::BackendError;
use provider_api::factory::ProviderCapabilities;
use provider_api::types::{
    MediaRelayConfig, ProviderCredentials, ProviderKind, RoomId, StreamLayout, StreamPushConfig,
    UserId, UserRole,
};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Resource a long-running backend operation holds while in flight.
///
/// At most one operation per resource may be pending; a second request for
/// the same resource is rejected with `OperationInProgress`, and teardown
/// operations cancel the in-flight operation they supersede.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpResource {
    /// Provider configuration/teardown.
    Provider,
    /// Messaging login/logout.
    Session,
    /// Room join/leave/role switch.
    Room,
    /// Media relay start/stop.
    Relay,
    /// Stream push start/stop.
    Push,
}

impl OpResource {
    /// Returns the resource as a string for logging and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            OpResource::Provider => "provider",
            OpResource::Session => "session",
            OpResource::Room => "room",
            OpResource::Relay => "relay",
            OpResource::Push => "push",
        }
    }
}

/// Messages sent to the coordinator actor.
#[derive(Debug)]
pub enum CoordinatorMessage {
    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------
    /// Build and initialize the provider pair. Valid once per teardown.
    Configure {
        kind: ProviderKind,
        credentials: ProviderCredentials,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Drop the provider pair and all derived state.
    Teardown {
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Establish the messaging identity and create the session.
    Login {
        user_id: UserId,
        user_name: String,
        role: UserRole,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Destroy the session. Best-effort backend logout, local cleanup always.
    Logout {
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Join a media room. Requires an active session.
    JoinRoom {
        room: RoomId,
        token: Option<String>,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Leave the current room. Resets relay, push, and volume state.
    LeaveRoom {
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Switch role within the current room.
    SwitchRole {
        role: UserRole,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    // ------------------------------------------------------------------
    // Audio settings
    // ------------------------------------------------------------------
    SetMicrophoneMuted {
        muted: bool,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    SetLocalAudioStreamActive {
        active: bool,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    SetAudioMixingVolume {
        volume: i32,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    SetPlaybackSignalVolume {
        volume: i32,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    SetRecordingSignalVolume {
        volume: i32,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Apply a persisted settings snapshot without touching the backend.
    RestoreAudioSettings {
        snapshot: AudioSettings,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    // ------------------------------------------------------------------
    // Volume indicator
    // ------------------------------------------------------------------
    EnableVolumeIndicator {
        config: VolumeDetectionConfig,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    DisableVolumeIndicator {
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    // ------------------------------------------------------------------
    // Media relay
    // ------------------------------------------------------------------
    StartMediaRelay {
        config: MediaRelayConfig,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    UpdateMediaRelay {
        config: MediaRelayConfig,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    PauseMediaRelay {
        channel: String,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    ResumeMediaRelay {
        channel: String,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    StopMediaRelay {
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    // ------------------------------------------------------------------
    // Stream push
    // ------------------------------------------------------------------
    StartStreamPush {
        config: StreamPushConfig,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    UpdateStreamPushLayout {
        layout: StreamLayout,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    StopStreamPush {
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    // ------------------------------------------------------------------
    // Messaging pass-throughs (require login)
    // ------------------------------------------------------------------
    SendPeerMessage {
        user: UserId,
        payload: String,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    SendChannelMessage {
        channel: String,
        payload: String,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    JoinChannel {
        channel: String,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    LeaveChannel {
        channel: String,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    SetUserAttributes {
        attributes: HashMap<String, String>,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    GetUserAttributes {
        user: UserId,
        respond_to: oneshot::Sender<Result<HashMap<String, String>, CoordinatorError>>,
    },

    // ------------------------------------------------------------------
    // Read-only snapshots (connection state and the volume view are read
    // from their watch channels on the handle, not through the mailbox)
    // ------------------------------------------------------------------
    GetSession {
        respond_to: oneshot::Sender<Option<UserSession>>,
    },

    GetAudioSettings {
        respond_to: oneshot::Sender<AudioSettings>,
    },

    GetRelayState {
        respond_to: oneshot::Sender<MediaRelayState>,
    },

    GetStreamPushState {
        respond_to: oneshot::Sender<StreamPushState>,
    },

    GetCapabilities {
        respond_to: oneshot::Sender<Option<ProviderCapabilities>>,
    },

    GetStatus {
        respond_to: oneshot::Sender<CoordinatorStatus>,
    },

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------
    /// A spawned backend operation finished. Stale epochs are dropped.
    OpCompleted {
        resource: OpResource,
        epoch: u64,
        result: Result<(), BackendError>,
    },
}

/// Point-in-time status of the coordinator, for health checks.
#[derive(Debug, Clone)]
pub struct CoordinatorStatus {
    /// Whether a provider pair is configured.
    pub configured: bool,
    /// Whether a session is logged in.
    pub logged_in: bool,
    /// Whether a room is joined.
    pub in_room: bool,
    /// Long-running backend operations currently in flight.
    pub pending_ops: usize,
    /// Current mailbox depth.
    pub mailbox_depth: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_op_resource_labels() {
        assert_eq!(OpResource::Provider.as_str(), "provider");
        assert_eq!(OpResource::Session.as_str(), "session");
        assert_eq!(OpResource::Room.as_str(), "room");
        assert_eq!(OpResource::Relay.as_str(), "relay");
        assert_eq!(OpResource::Push.as_str(), "push");
    }

    #[test]
    fn test_status_fields() {
        let status = CoordinatorStatus {
            configured: true,
            logged_in: false,
            in_room: false,
            pending_ops: 0,
            mailbox_depth: 0,
        };
        assert!(status.configured);
        assert!(!status.logged_in);
        assert_eq!(status.pending_ops, 0);
    }
}
