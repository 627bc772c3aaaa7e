//! Pre-built test data for coordinator tests.

use provider_api::secret::SecretString;
use provider_api::types::{
    LayoutRegion, MediaRelayConfig, ProviderCredentials, RelayChannel, StreamLayout,
    StreamPushConfig, UserId, VolumeSample,
};

/// Credentials accepted by the mock provider.
#[must_use]
pub fn test_credentials() -> ProviderCredentials {
    ProviderCredentials {
        app_id: "test-app".to_string(),
        app_certificate: SecretString::from("test-certificate"),
    }
}

/// A relay channel endpoint for `user` in `channel`.
#[must_use]
pub fn relay_channel(channel: &str, user: &str, uid: u32) -> RelayChannel {
    RelayChannel {
        channel_name: channel.to_string(),
        token: format!("token-{channel}"),
        user_id: UserId::new(user),
        uid,
    }
}

/// A relay configuration from `source` to the named destination channels.
#[must_use]
pub fn relay_config(source: &str, destinations: &[&str]) -> MediaRelayConfig {
    MediaRelayConfig {
        source: relay_channel(source, "relay-bot", 1000),
        destinations: destinations
            .iter()
            .enumerate()
            .map(|(i, name)| relay_channel(name, "relay-bot", 2000 + i as u32))
            .collect(),
    }
}

/// A single full-frame layout region for `user`.
#[must_use]
pub fn layout_region(user: &str) -> LayoutRegion {
    LayoutRegion {
        user_id: UserId::new(user),
        x: 0,
        y: 0,
        width: 640,
        height: 360,
        z_order: 0,
        alpha: 1.0,
    }
}

/// A stream push configuration targeting `push_url` with one region.
#[must_use]
pub fn push_config(push_url: &str) -> StreamPushConfig {
    StreamPushConfig {
        push_url: push_url.to_string(),
        width: 640,
        height: 360,
        bitrate: 800,
        framerate: 15,
        layout: StreamLayout {
            regions: vec![layout_region("host")],
        },
        background_color: 0x0000_0000,
    }
}

/// A volume sample for `user`.
#[must_use]
pub fn volume_sample(user: &str, volume: f32) -> VolumeSample {
    VolumeSample {
        user_id: UserId::new(user),
        volume,
    }
}
