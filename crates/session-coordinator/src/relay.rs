//! Media relay orchestration.
//!
//! Tracks per-destination-channel relay state across a
//! one-to-one/one-to-many/many-to-many topology and reduces it to the
//! overall relay state. Pause/resume act on a single destination without
//! disturbing the others; stop is best-effort and always returns to idle.

use crate::errors::CoordinatorError;
use crate::state::{MediaRelayState, RelayChannelState, RelayOverallState};
use provider_api::types::MediaRelayConfig;
use std::collections::{HashMap, HashSet};

/// Per-session relay state owned by the coordinator actor.
#[derive(Debug, Default)]
pub struct RelayOrchestrator {
    /// Active relay config; `None` while idle.
    config: Option<MediaRelayConfig>,
    /// Destination channel states.
    channels: HashMap<String, RelayChannelState>,
}

impl RelayOrchestrator {
    /// Create an idle orchestrator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no relay session is active or starting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.channels.is_empty()
    }

    /// The active relay config, if any.
    #[must_use]
    pub fn config(&self) -> Option<&MediaRelayConfig> {
        self.config.as_ref()
    }

    /// Validate a relay config before starting.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for an empty destination list, duplicate
    /// destination channel names, or a uid reused within the session.
    pub fn validate(config: &MediaRelayConfig) -> Result<(), CoordinatorError> {
        if config.destinations.is_empty() {
            return Err(CoordinatorError::InvalidConfiguration(
                "media relay requires at least one destination channel".to_string(),
            ));
        }

        let mut names = HashSet::new();
        let mut uids = HashSet::new();
        uids.insert(config.source.uid);
        for destination in &config.destinations {
            if !names.insert(destination.channel_name.as_str()) {
                return Err(CoordinatorError::InvalidConfiguration(format!(
                    "duplicate destination channel '{}'",
                    destination.channel_name
                )));
            }
            if !uids.insert(destination.uid) {
                return Err(CoordinatorError::InvalidConfiguration(format!(
                    "uid {} reused within the relay session",
                    destination.uid
                )));
            }
        }
        Ok(())
    }

    /// Begin a relay start: all destinations enter `Connecting`.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` if the config fails validation, or
    /// `InvalidState` if a relay session is already active.
    pub fn begin_start(&mut self, config: MediaRelayConfig) -> Result<(), CoordinatorError> {
        Self::validate(&config)?;
        if !self.is_idle() {
            return Err(CoordinatorError::InvalidState(
                "media relay already active".to_string(),
            ));
        }

        for destination in &config.destinations {
            self.channels
                .insert(destination.channel_name.clone(), RelayChannelState::Connecting);
        }
        self.config = Some(config);
        Ok(())
    }

    /// The backend accepted the relay: all destinations enter `Running`.
    pub fn complete_start(&mut self) {
        for state in self.channels.values_mut() {
            *state = RelayChannelState::Running;
        }
    }

    /// The backend rejected the relay start: back to idle for a clean retry.
    pub fn fail_start(&mut self) {
        self.reset();
    }

    /// Check that a destination-set update is valid (session active).
    ///
    /// # Errors
    ///
    /// `InvalidState` when no relay session is active.
    pub fn ensure_active(&self) -> Result<(), CoordinatorError> {
        if self.is_idle() {
            return Err(CoordinatorError::InvalidState(
                "no relay session active".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the destination set after a successful backend update.
    ///
    /// Destinations kept across the update retain their state; new ones
    /// start out running.
    pub fn apply_update(&mut self, config: MediaRelayConfig) {
        let mut next = HashMap::new();
        for destination in &config.destinations {
            let state = self
                .channels
                .remove(&destination.channel_name)
                .unwrap_or(RelayChannelState::Running);
            next.insert(destination.channel_name.clone(), state);
        }
        self.channels = next;
        self.config = Some(config);
    }

    /// Check that pausing `channel` is valid (destination in `Running`).
    ///
    /// # Errors
    ///
    /// `InvalidChannelState` if the channel is unknown or not running.
    pub fn ensure_can_pause(&self, channel: &str) -> Result<(), CoordinatorError> {
        self.ensure_channel_in(channel, &RelayChannelState::Running)
    }

    /// Check that resuming `channel` is valid (destination in `Paused`).
    ///
    /// # Errors
    ///
    /// `InvalidChannelState` if the channel is unknown or not paused.
    pub fn ensure_can_resume(&self, channel: &str) -> Result<(), CoordinatorError> {
        self.ensure_channel_in(channel, &RelayChannelState::Paused)
    }

    /// Mark one destination as paused. Other channels are unaffected.
    pub fn mark_paused(&mut self, channel: &str) {
        if let Some(state) = self.channels.get_mut(channel) {
            *state = RelayChannelState::Paused;
        }
    }

    /// Mark one destination as running again. Other channels are unaffected.
    pub fn mark_running(&mut self, channel: &str) {
        if let Some(state) = self.channels.get_mut(channel) {
            *state = RelayChannelState::Running;
        }
    }

    /// A backend-reported error for one destination channel.
    pub fn channel_error(&mut self, channel: &str, reason: String) {
        if let Some(state) = self.channels.get_mut(channel) {
            *state = RelayChannelState::Error(reason);
        }
    }

    /// Tear down the whole session, returning to idle regardless of
    /// per-channel state.
    pub fn reset(&mut self) {
        self.config = None;
        self.channels.clear();
    }

    /// Current relay snapshot with the overall reduction applied.
    #[must_use]
    pub fn state(&self) -> MediaRelayState {
        MediaRelayState {
            overall: reduce(&self.channels),
            channels: self.channels.clone(),
        }
    }

    fn ensure_channel_in(
        &self,
        channel: &str,
        expected: &RelayChannelState,
    ) -> Result<(), CoordinatorError> {
        match self.channels.get(channel) {
            Some(state) if state == expected => Ok(()),
            Some(state) => Err(CoordinatorError::InvalidChannelState {
                channel: channel.to_string(),
                state: state.as_str().to_string(),
            }),
            None => Err(CoordinatorError::InvalidChannelState {
                channel: channel.to_string(),
                state: "unknown".to_string(),
            }),
        }
    }
}

/// Reduce per-channel states to the overall relay state.
///
/// Any error wins; no channels (or all idle) is idle; all channels in
/// running/paused is running, or paused when every channel is paused;
/// anything else is connecting.
fn reduce(channels: &HashMap<String, RelayChannelState>) -> RelayOverallState {
    if channels
        .values()
        .any(|s| matches!(s, RelayChannelState::Error(_)))
    {
        return RelayOverallState::Error;
    }
    if channels.is_empty()
        || channels
            .values()
            .all(|s| matches!(s, RelayChannelState::Idle))
    {
        return RelayOverallState::Idle;
    }
    if channels
        .values()
        .all(|s| matches!(s, RelayChannelState::Running | RelayChannelState::Paused))
    {
        if channels
            .values()
            .all(|s| matches!(s, RelayChannelState::Paused))
        {
            return RelayOverallState::Paused;
        }
        return RelayOverallState::Running;
    }
    RelayOverallState::Connecting
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use provider_api::types::{RelayChannel, UserId};

    fn leg(channel: &str, uid: u32) -> RelayChannel {
        RelayChannel {
            channel_name: channel.to_string(),
            token: String::new(),
            user_id: UserId::new("relay-user"),
            uid,
        }
    }

    fn two_destination_config() -> MediaRelayConfig {
        MediaRelayConfig {
            source: leg("main", 1),
            destinations: vec![leg("side-a", 2), leg("side-b", 3)],
        }
    }

    #[test]
    fn test_zero_destinations_rejected() {
        let config = MediaRelayConfig {
            source: leg("main", 1),
            destinations: vec![],
        };
        let result = RelayOrchestrator::validate(&config);
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_duplicate_uid_rejected() {
        let config = MediaRelayConfig {
            source: leg("main", 1),
            destinations: vec![leg("side-a", 2), leg("side-b", 2)],
        };
        let result = RelayOrchestrator::validate(&config);
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_start_lifecycle() {
        let mut relay = RelayOrchestrator::new();
        relay.begin_start(two_destination_config()).unwrap();
        assert_eq!(relay.state().overall, RelayOverallState::Connecting);

        relay.complete_start();
        let state = relay.state();
        assert_eq!(state.overall, RelayOverallState::Running);
        assert_eq!(
            state.channels.get("side-a"),
            Some(&RelayChannelState::Running)
        );
    }

    #[test]
    fn test_start_while_active_rejected() {
        let mut relay = RelayOrchestrator::new();
        relay.begin_start(two_destination_config()).unwrap();

        let result = relay.begin_start(two_destination_config());
        assert!(matches!(result, Err(CoordinatorError::InvalidState(_))));
    }

    #[test]
    fn test_pause_one_leaves_other_running() {
        let mut relay = RelayOrchestrator::new();
        relay.begin_start(two_destination_config()).unwrap();
        relay.complete_start();

        relay.ensure_can_pause("side-a").unwrap();
        relay.mark_paused("side-a");

        let state = relay.state();
        assert_eq!(
            state.channels.get("side-a"),
            Some(&RelayChannelState::Paused)
        );
        assert_eq!(
            state.channels.get("side-b"),
            Some(&RelayChannelState::Running)
        );
        assert_eq!(state.overall, RelayOverallState::Running);
    }

    #[test]
    fn test_all_paused_reduces_to_paused() {
        let mut relay = RelayOrchestrator::new();
        relay.begin_start(two_destination_config()).unwrap();
        relay.complete_start();
        relay.mark_paused("side-a");
        relay.mark_paused("side-b");

        assert_eq!(relay.state().overall, RelayOverallState::Paused);
    }

    #[test]
    fn test_pause_guard_rejects_wrong_state() {
        let mut relay = RelayOrchestrator::new();
        relay.begin_start(two_destination_config()).unwrap();
        relay.complete_start();
        relay.mark_paused("side-a");

        // Pausing a paused channel
        let result = relay.ensure_can_pause("side-a");
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidChannelState { .. })
        ));

        // Resuming a running channel
        let result = relay.ensure_can_resume("side-b");
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidChannelState { .. })
        ));

        // Unknown channel
        let result = relay.ensure_can_pause("nope");
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidChannelState { .. })
        ));
    }

    #[test]
    fn test_channel_error_dominates_reduction() {
        let mut relay = RelayOrchestrator::new();
        relay.begin_start(two_destination_config()).unwrap();
        relay.complete_start();

        relay.channel_error("side-b", "destination rejected".to_string());

        let state = relay.state();
        assert_eq!(state.overall, RelayOverallState::Error);
        // The healthy channel is untouched
        assert_eq!(
            state.channels.get("side-a"),
            Some(&RelayChannelState::Running)
        );
    }

    #[test]
    fn test_reset_returns_to_idle_regardless_of_state() {
        let mut relay = RelayOrchestrator::new();
        relay.begin_start(two_destination_config()).unwrap();
        relay.complete_start();
        relay.channel_error("side-a", "boom".to_string());

        relay.reset();
        assert!(relay.is_idle());
        assert_eq!(relay.state().overall, RelayOverallState::Idle);
        assert!(relay.config().is_none());
    }

    #[test]
    fn test_apply_update_keeps_surviving_channel_state() {
        let mut relay = RelayOrchestrator::new();
        relay.begin_start(two_destination_config()).unwrap();
        relay.complete_start();
        relay.mark_paused("side-a");

        // Drop side-b, keep side-a, add side-c
        let update = MediaRelayConfig {
            source: leg("main", 1),
            destinations: vec![leg("side-a", 2), leg("side-c", 4)],
        };
        relay.ensure_active().unwrap();
        relay.apply_update(update);

        let state = relay.state();
        assert_eq!(
            state.channels.get("side-a"),
            Some(&RelayChannelState::Paused)
        );
        assert_eq!(
            state.channels.get("side-c"),
            Some(&RelayChannelState::Running)
        );
        assert!(!state.channels.contains_key("side-b"));
    }

    #[test]
    fn test_ensure_active_rejects_idle() {
        let relay = RelayOrchestrator::new();
        assert!(matches!(
            relay.ensure_active(),
            Err(CoordinatorError::InvalidState(_))
        ));
    }

    #[test]
    fn test_fail_start_returns_to_idle() {
        let mut relay = RelayOrchestrator::new();
        relay.begin_start(two_destination_config()).unwrap();
        relay.fail_start();
        assert!(relay.is_idle());
    }
}
