//! Events the coordinator republishes to subscribers.
//!
//! Subscribers (UI, logging, persistence) receive these over a broadcast
//! channel. Publication is fire-and-forget: a slow subscriber lags and
//! misses events but never stalls the actor loop.

use crate::state::{AudioSettings, ConnectionState, MediaRelayState, StreamPushState, UserSession};
use provider_api::types::{ChannelKind, ConnectionChange, UserId};

/// An event published by the coordinator.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// The media connection state changed.
    ConnectionStateChanged(ConnectionState),

    /// The messaging channel's connection state changed.
    MessagingConnectionChanged(ConnectionChange),

    /// The session was created, updated, or destroyed.
    ///
    /// Carries `None` after logout. The persistence collaborator may store
    /// this snapshot; the coordinator does not define the storage format.
    SessionChanged(Option<UserSession>),

    /// Audio settings changed; snapshot for the persistence collaborator.
    AudioSettingsChanged(AudioSettings),

    /// A channel token was renewed successfully.
    TokenRenewed {
        /// The renewed channel.
        channel: ChannelKind,
    },

    /// Token renewal exhausted its retries. The session stays up; the
    /// subscriber decides whether to tear down.
    TokenRenewalFailed {
        /// The channel whose token could not be renewed.
        channel: ChannelKind,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The dominant speaker changed (including to nobody).
    DominantSpeakerChanged(Option<UserId>),

    /// Discrete active-speaker notification forwarded from the backend.
    ActiveSpeaker(UserId),

    /// The media relay state changed.
    RelayStateChanged(MediaRelayState),

    /// The stream push state changed.
    StreamPushStateChanged(StreamPushState),

    /// A peer-to-peer message arrived.
    PeerMessageReceived {
        /// Sending user.
        from: UserId,
        /// Message payload.
        payload: String,
    },

    /// A channel message arrived.
    ChannelMessageReceived {
        /// Messaging channel name.
        channel: String,
        /// Sending user.
        from: UserId,
        /// Message payload.
        payload: String,
    },

    /// Online status of a subscribed peer changed.
    PeerOnlineStatusChanged {
        /// The peer whose status changed.
        user: UserId,
        /// Whether the peer is now online.
        online: bool,
    },
}

impl CoordinatorEvent {
    /// Returns a short event name for logging and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            CoordinatorEvent::ConnectionStateChanged(_) => "connection_state_changed",
            CoordinatorEvent::MessagingConnectionChanged(_) => "messaging_connection_changed",
            CoordinatorEvent::SessionChanged(_) => "session_changed",
            CoordinatorEvent::AudioSettingsChanged(_) => "audio_settings_changed",
            CoordinatorEvent::TokenRenewed { .. } => "token_renewed",
            CoordinatorEvent::TokenRenewalFailed { .. } => "token_renewal_failed",
            CoordinatorEvent::DominantSpeakerChanged(_) => "dominant_speaker_changed",
            CoordinatorEvent::ActiveSpeaker(_) => "active_speaker",
            CoordinatorEvent::RelayStateChanged(_) => "relay_state_changed",
            CoordinatorEvent::StreamPushStateChanged(_) => "stream_push_state_changed",
            CoordinatorEvent::PeerMessageReceived { .. } => "peer_message_received",
            CoordinatorEvent::ChannelMessageReceived { .. } => "channel_message_received",
            CoordinatorEvent::PeerOnlineStatusChanged { .. } => "peer_online_status_changed",
        }
    }
}
