//! Coordinator-owned session state.
//!
//! Everything in this module is owned exclusively by the coordinator actor.
//! Provider backends receive read-only snapshots for operations and report
//! changes back only through events; callers observe state through published
//! snapshots (`watch` channels and query messages), never by reference.

use chrono::{DateTime, Utc};
use provider_api::types::{RoomId, UserId, UserRole};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Connection state of the media session.
///
/// Transitions are driven only by the coordinator actor; callers and
/// backends never set this directly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to any room.
    #[default]
    Disconnected,
    /// A room join is in flight.
    Connecting,
    /// Joined a room.
    Connected,
    /// The backend dropped the room connection and is retrying.
    Reconnecting,
    /// The connection failed terminally.
    Failed(String),
}

impl ConnectionState {
    /// Returns the state as a string for logging and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed(_) => "failed",
        }
    }
}

/// The live user session. Exactly one per coordinator.
///
/// Created on successful login, destroyed on logout. `room_id` is set only
/// while joined to a room; login and room membership are independent
/// sub-flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Stable user identifier.
    pub user_id: UserId,
    /// Display name.
    pub user_name: String,
    /// Current role; mutable via the explicit role-switch operation.
    pub role: UserRole,
    /// Room currently joined, if any.
    pub room_id: Option<RoomId>,
    /// When the session was established.
    pub join_time: DateTime<Utc>,
}

/// Local audio configuration.
///
/// Mutated only through coordinator setters; volume values are clamped to
/// `0..=100` before they reach the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Whether the local microphone is muted.
    pub microphone_muted: bool,
    /// Whether the local audio stream is being published.
    pub local_audio_stream_active: bool,
    /// Audio mixing volume, `0..=100`.
    pub audio_mixing_volume: u8,
    /// Playback signal volume, `0..=100`.
    pub playback_signal_volume: u8,
    /// Recording signal volume, `0..=100`.
    pub recording_signal_volume: u8,
    /// When any field last changed.
    pub last_modified: DateTime<Utc>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            microphone_muted: false,
            local_audio_stream_active: true,
            audio_mixing_volume: 100,
            playback_signal_volume: 100,
            recording_signal_volume: 100,
            last_modified: Utc::now(),
        }
    }
}

impl AudioSettings {
    /// Clamp a caller-supplied volume into the documented `0..=100` range.
    #[must_use]
    pub fn clamp_volume(volume: i32) -> u8 {
        // i32 -> u8 is lossless after the clamp
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            volume.clamp(0, 100) as u8
        }
    }
}

/// Smoothed per-user volume info, replaced wholesale on each detection tick.
#[derive(Debug, Clone, PartialEq)]
pub struct UserVolumeInfo {
    /// Reporting user.
    pub user_id: UserId,
    /// Smoothed volume in `[0.0, 1.0]`.
    pub volume: f32,
    /// Whether the smoothed volume exceeds the speaking threshold.
    pub is_speaking: bool,
    /// When this sample was processed.
    pub timestamp: DateTime<Utc>,
}

/// Configuration for volume detection.
///
/// Immutable once the indicator is enabled; enabling again with a new
/// config performs an internal disable/enable cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeDetectionConfig {
    /// Cadence at which the backend reports samples.
    pub detection_interval: Duration,
    /// Smoothed volume above this counts as speaking.
    pub speaking_threshold: f32,
    /// Smoothed volume below this counts as silence.
    pub silence_threshold: f32,
    /// Whether the local user's own samples are included.
    pub include_local_user: bool,
    /// Exponential smoothing factor in `[0.0, 1.0]`.
    pub smooth_factor: f32,
}

impl Default for VolumeDetectionConfig {
    fn default() -> Self {
        Self {
            detection_interval: Duration::from_millis(300),
            speaking_threshold: 0.3,
            silence_threshold: 0.05,
            include_local_user: true,
            smooth_factor: 0.3,
        }
    }
}

/// The full published volume view: per-user info plus derived views.
///
/// Replaced wholesale on each detection tick; cleared to empty when the
/// indicator is disabled.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VolumeView {
    /// All users seen in the last tick, smoothed and classified.
    pub users: Vec<UserVolumeInfo>,
    /// Users currently classified as speaking.
    pub speaking_users: BTreeSet<UserId>,
    /// The speaking user with the highest smoothed volume, ties broken by
    /// lexicographically smallest user ID.
    pub dominant_speaker: Option<UserId>,
}

/// State of one media relay destination channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayChannelState {
    /// No relay session active for this channel.
    Idle,
    /// Relay start in flight.
    Connecting,
    /// Media is being forwarded into this channel.
    Running,
    /// Forwarding into this channel is paused.
    Paused,
    /// The backend reported an error for this channel.
    Error(String),
}

impl RelayChannelState {
    /// Returns the state as a string for logging and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RelayChannelState::Idle => "idle",
            RelayChannelState::Connecting => "connecting",
            RelayChannelState::Running => "running",
            RelayChannelState::Paused => "paused",
            RelayChannelState::Error(_) => "error",
        }
    }
}

/// Overall relay state, reduced from the per-channel states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayOverallState {
    /// No relay session.
    #[default]
    Idle,
    /// At least one channel is still connecting.
    Connecting,
    /// All channels are forwarding (possibly some paused).
    Running,
    /// Every channel is paused.
    Paused,
    /// At least one channel is in error.
    Error,
}

/// Snapshot of the media relay session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaRelayState {
    /// Reduction of `channels`: any error wins, all idle is idle, all
    /// running/paused is running (paused only when every channel is
    /// paused), anything else is connecting.
    pub overall: RelayOverallState,
    /// Per-destination-channel states.
    pub channels: HashMap<String, RelayChannelState>,
}

/// State of the outbound transcoded stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamPushState {
    /// No stream push active.
    #[default]
    Stopped,
    /// Start in flight.
    Starting,
    /// Stream is being pushed.
    Running,
    /// Stop in flight.
    Stopping,
    /// The push failed.
    Error(String),
}

impl StreamPushState {
    /// Returns the state as a string for logging and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StreamPushState::Stopped => "stopped",
            StreamPushState::Starting => "starting",
            StreamPushState::Running => "running",
            StreamPushState::Stopping => "stopping",
            StreamPushState::Error(_) => "error",
        }
    }
}
