//! Identifiers and wire-level configuration shared by both capability traits.

use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a media room (vendor SDKs call this a "channel").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    /// Create a room ID from a caller-supplied name.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The room ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a user, caller-supplied and stable across providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Create a user ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The user ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a user within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    /// Publishes local audio and may manage the room.
    Host,
    /// Receive-only participant.
    Audience,
}

impl UserRole {
    /// Whether this role publishes a local audio stream.
    #[must_use]
    pub const fn can_publish_audio(&self) -> bool {
        matches!(self, UserRole::Host)
    }

    /// Returns the role as a string for logging and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            UserRole::Host => "host",
            UserRole::Audience => "audience",
        }
    }
}

/// Identifier of a provider backend registered with the factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderKind(pub String);

impl ProviderKind {
    /// Create a provider kind from its registry identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The provider identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two backend channels a provider pair exposes.
///
/// Token renewal timers and connection-change events are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Real-time media transport (RTC).
    Media,
    /// Real-time messaging (RTM).
    Messaging,
}

impl ChannelKind {
    /// Returns the channel kind as a string for logging and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Media => "media",
            ChannelKind::Messaging => "messaging",
        }
    }
}

/// Credentials handed to a backend at `initialize`.
///
/// The app certificate is wrapped in [`SecretString`] so `Debug` output is
/// redacted.
#[derive(Clone)]
pub struct ProviderCredentials {
    /// Vendor application ID.
    pub app_id: String,
    /// Vendor application certificate.
    pub app_certificate: SecretString,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"[REDACTED]")
            .finish()
    }
}

/// A raw per-participant volume sample reported by the media backend.
///
/// Samples are ephemeral; the coordinator's aggregator replaces its whole
/// view on every report.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSample {
    /// Reporting user.
    pub user_id: UserId,
    /// Normalized volume in `[0.0, 1.0]`.
    pub volume: f32,
}

/// Connection-state change reported by a backend channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionChange {
    /// The channel is connected.
    Connected,
    /// The channel dropped and the backend is retrying.
    Reconnecting,
    /// The channel is disconnected.
    Disconnected,
    /// The channel failed terminally.
    Failed(String),
}

/// One leg of a media relay: either the source channel or a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayChannel {
    /// Destination (or source) channel name.
    pub channel_name: String,
    /// Join token for that channel, empty when the vendor project has no
    /// certificate enabled.
    pub token: String,
    /// User identity relayed into the channel.
    pub user_id: UserId,
    /// Numeric uid within the relay session; must be unique per session.
    pub uid: u32,
}

/// Configuration for a cross-channel media relay session.
///
/// One source channel plus one or more destinations
/// (one-to-one / one-to-many / many-to-many topologies).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRelayConfig {
    /// The channel whose media is forwarded.
    pub source: RelayChannel,
    /// Channels receiving the forwarded media.
    pub destinations: Vec<RelayChannel>,
}

/// One region of a transcoded stream layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRegion {
    /// User rendered in this region.
    pub user_id: UserId,
    /// Left offset in pixels.
    pub x: u32,
    /// Top offset in pixels.
    pub y: u32,
    /// Region width in pixels.
    pub width: u32,
    /// Region height in pixels.
    pub height: u32,
    /// Stacking order; higher values render on top.
    pub z_order: u32,
    /// Region opacity in `[0.0, 1.0]`.
    pub alpha: f32,
}

/// Layout of a transcoded stream: region placement per user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamLayout {
    /// Rendered regions, one per visible user.
    pub regions: Vec<LayoutRegion>,
}

/// Immutable configuration snapshot for one outbound transcoded stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPushConfig {
    /// Ingest URL of the external streaming endpoint.
    pub push_url: String,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output bitrate in kbps.
    pub bitrate: u32,
    /// Output framerate in fps.
    pub framerate: u32,
    /// Initial layout.
    pub layout: StreamLayout,
    /// Background color as 0xRRGGBB.
    pub background_color: u32,
}
