//! Event types backends emit toward the coordinator.
//!
//! Backends are producers on an `mpsc` channel whose receiver lives inside
//! the coordinator's serialized actor loop. This makes event ordering and
//! backpressure explicit: a backend that outpaces the coordinator blocks on
//! the channel rather than racing ad hoc callbacks against each other.

use crate::types::{ChannelKind, ConnectionChange, UserId, VolumeSample};
use std::time::Duration;

/// Recommended capacity for the provider event channel.
///
/// Sized for bursty volume reports at the fastest supported detection
/// cadence without dropping connection or token events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// An event produced by a provider backend.
///
/// Events are the only way a backend communicates state changes; backends
/// never touch coordinator state directly.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Connection state of one backend channel changed.
    ConnectionChanged {
        /// Which backend channel changed.
        channel: ChannelKind,
        /// The new connection state.
        change: ConnectionChange,
    },

    /// A channel's token expires soon; the coordinator schedules renewal.
    TokenWillExpire {
        /// Which backend channel's token is expiring.
        channel: ChannelKind,
        /// Time until expiry as reported by the vendor.
        expires_in: Duration,
    },

    /// Periodic per-participant volume samples (volume indicator enabled).
    VolumeReport(Vec<VolumeSample>),

    /// Discrete active-speaker notification from the media backend.
    ActiveSpeaker(UserId),

    /// A relay destination channel entered an error state.
    RelayChannelError {
        /// Destination channel name.
        channel: String,
        /// Vendor-supplied reason.
        reason: String,
    },

    /// The running stream push failed on the vendor side.
    StreamPushError {
        /// Vendor-supplied reason.
        reason: String,
    },

    /// A peer-to-peer message arrived.
    PeerMessage {
        /// Sending user.
        from: UserId,
        /// Message payload.
        payload: String,
    },

    /// A channel message arrived.
    ChannelMessage {
        /// Messaging channel name.
        channel: String,
        /// Sending user.
        from: UserId,
        /// Message payload.
        payload: String,
    },

    /// Online status of a subscribed peer changed.
    PeerOnlineStatus {
        /// The peer whose status changed.
        user: UserId,
        /// Whether the peer is now online.
        online: bool,
    },
}

impl ProviderEvent {
    /// Returns a short event name for logging and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ProviderEvent::ConnectionChanged { .. } => "connection_changed",
            ProviderEvent::TokenWillExpire { .. } => "token_will_expire",
            ProviderEvent::VolumeReport(_) => "volume_report",
            ProviderEvent::ActiveSpeaker(_) => "active_speaker",
            ProviderEvent::RelayChannelError { .. } => "relay_channel_error",
            ProviderEvent::StreamPushError { .. } => "stream_push_error",
            ProviderEvent::PeerMessage { .. } => "peer_message",
            ProviderEvent::ChannelMessage { .. } => "channel_message",
            ProviderEvent::PeerOnlineStatus { .. } => "peer_online_status",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::UserId;

    #[test]
    fn test_event_names_are_stable() {
        let event = ProviderEvent::TokenWillExpire {
            channel: ChannelKind::Media,
            expires_in: Duration::from_secs(30),
        };
        assert_eq!(event.name(), "token_will_expire");

        let event = ProviderEvent::ActiveSpeaker(UserId::new("u1"));
        assert_eq!(event.name(), "active_speaker");
    }
}
