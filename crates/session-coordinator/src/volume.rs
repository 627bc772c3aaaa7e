//! Volume indicator aggregation.
//!
//! Consumes raw per-participant volume samples from the media backend at
//! the configured cadence, applies smoothing and speaking-threshold
//! classification, derives the dominant speaker, and republishes a stable
//! view over a `watch` channel. Slow readers observe the latest view and
//! miss intermediate ticks; they can never stall aggregation.

use crate::state::{UserVolumeInfo, VolumeDetectionConfig, VolumeView};
use chrono::Utc;
use provider_api::types::{UserId, VolumeSample};
use tokio::sync::watch;
use tracing::debug;

/// Aggregates raw volume samples into the published volume view.
///
/// Owned by the coordinator actor; ticks are processed inside the actor
/// loop so view replacement is serialized with enable/disable.
pub struct VolumeAggregator {
    /// Active detection config; `None` while disabled.
    config: Option<VolumeDetectionConfig>,
    /// Local user, filtered out when `include_local_user` is false.
    local_user: Option<UserId>,
    /// Publisher of the derived view.
    view_tx: watch::Sender<VolumeView>,
}

impl VolumeAggregator {
    /// Create a disabled aggregator and its view receiver.
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<VolumeView>) {
        let (view_tx, view_rx) = watch::channel(VolumeView::default());
        (
            Self {
                config: None,
                local_user: None,
                view_tx,
            },
            view_rx,
        )
    }

    /// Whether the indicator is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// The active detection config, if enabled.
    #[must_use]
    pub fn config(&self) -> Option<&VolumeDetectionConfig> {
        self.config.as_ref()
    }

    /// Enable aggregation with the given config.
    ///
    /// Enabling while already enabled reconfigures by disabling first;
    /// the published view is cleared before the new config takes effect.
    pub fn enable(&mut self, config: VolumeDetectionConfig, local_user: Option<UserId>) {
        if self.is_enabled() {
            self.disable();
        }
        self.config = Some(config);
        self.local_user = local_user;
    }

    /// Disable aggregation and clear all derived views.
    ///
    /// Safe to call when not enabled (no-op).
    pub fn disable(&mut self) {
        if self.config.take().is_some() {
            self.local_user = None;
            self.view_tx.send_replace(VolumeView::default());
        }
    }

    /// Process one detection tick, replacing the published view wholesale.
    ///
    /// Returns the new dominant speaker when it differs from the previous
    /// tick's, so the caller can emit a discrete change event. Ticks while
    /// disabled are dropped.
    pub fn process_tick(&mut self, samples: &[VolumeSample]) -> Option<Option<UserId>> {
        let config = self.config.as_ref()?;

        let mut view = VolumeView::default();
        let now = Utc::now();

        for sample in samples {
            if !config.include_local_user && Some(&sample.user_id) == self.local_user.as_ref() {
                continue;
            }

            let raw = sample.volume.clamp(0.0, 1.0);
            // Smoothing rule reproduced from the reference behavior. Note
            // that it algebraically reduces to the raw sample for every
            // smooth_factor; see the repository design notes before
            // changing it to blend with the previous smoothed value.
            let smoothed = raw * config.smooth_factor + raw * (1.0 - config.smooth_factor);
            let is_speaking = smoothed > config.speaking_threshold;

            if is_speaking {
                view.speaking_users.insert(sample.user_id.clone());
            }

            view.users.push(UserVolumeInfo {
                user_id: sample.user_id.clone(),
                volume: smoothed,
                is_speaking,
                timestamp: now,
            });
        }

        view.dominant_speaker = dominant_speaker(&view.users);

        let previous = self.view_tx.borrow().dominant_speaker.clone();
        let changed = (previous != view.dominant_speaker).then(|| view.dominant_speaker.clone());

        debug!(
            target: "coordinator.volume",
            users = view.users.len(),
            speaking = view.speaking_users.len(),
            dominant = ?view.dominant_speaker,
            "Volume tick processed"
        );

        self.view_tx.send_replace(view);
        changed
    }
}

/// The speaking user with the strictly highest smoothed volume.
///
/// Ties resolve to the lexicographically smallest user ID so results are
/// deterministic across runs.
fn dominant_speaker(users: &[UserVolumeInfo]) -> Option<UserId> {
    let mut best: Option<&UserVolumeInfo> = None;
    for info in users.iter().filter(|info| info.is_speaking) {
        best = match best {
            None => Some(info),
            Some(current) => {
                if info.volume > current.volume
                    || (info.volume == current.volume && info.user_id < current.user_id)
                {
                    Some(info)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.map(|info| info.user_id.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> VolumeDetectionConfig {
        VolumeDetectionConfig {
            detection_interval: Duration::from_millis(200),
            speaking_threshold: 0.3,
            silence_threshold: 0.05,
            include_local_user: true,
            smooth_factor: 0.3,
        }
    }

    fn sample(user: &str, volume: f32) -> VolumeSample {
        VolumeSample {
            user_id: UserId::new(user),
            volume,
        }
    }

    #[test]
    fn test_speaking_classification_and_dominant() {
        let (mut agg, view_rx) = VolumeAggregator::new();
        agg.enable(test_config(), None);

        agg.process_tick(&[sample("u1", 0.5), sample("u2", 0.1)]);

        let view = view_rx.borrow().clone();
        assert_eq!(view.users.len(), 2);
        assert_eq!(view.speaking_users.len(), 1);
        assert!(view.speaking_users.contains(&UserId::new("u1")));
        assert_eq!(view.dominant_speaker, Some(UserId::new("u1")));
    }

    #[test]
    fn test_view_replaced_wholesale_each_tick() {
        let (mut agg, view_rx) = VolumeAggregator::new();
        agg.enable(test_config(), None);

        agg.process_tick(&[sample("u1", 0.5), sample("u2", 0.6)]);
        agg.process_tick(&[sample("u3", 0.4)]);

        let view = view_rx.borrow().clone();
        assert_eq!(view.users.len(), 1);
        assert_eq!(view.users.first().unwrap().user_id, UserId::new("u3"));
        assert!(!view.speaking_users.contains(&UserId::new("u1")));
    }

    #[test]
    fn test_smoothing_is_identity_for_any_factor() {
        // The reproduced smoothing rule collapses to the raw sample for
        // every smooth_factor value; this pins that behavior down so any
        // future fix shows up as a deliberate test change.
        for factor in [0.0_f32, 0.25, 0.5, 0.75, 1.0] {
            let (mut agg, view_rx) = VolumeAggregator::new();
            let config = VolumeDetectionConfig {
                smooth_factor: factor,
                ..test_config()
            };
            agg.enable(config, None);
            agg.process_tick(&[sample("u1", 0.42)]);

            let view = view_rx.borrow().clone();
            let info = view.users.first().unwrap();
            assert!((info.volume - 0.42).abs() < f32::EPSILON * 4.0);
        }
    }

    #[test]
    fn test_dominant_tie_breaks_to_smallest_user_id() {
        let (mut agg, view_rx) = VolumeAggregator::new();
        agg.enable(test_config(), None);

        agg.process_tick(&[sample("bob", 0.5), sample("alice", 0.5)]);

        let view = view_rx.borrow().clone();
        assert_eq!(view.dominant_speaker, Some(UserId::new("alice")));
    }

    #[test]
    fn test_local_user_filter() {
        let (mut agg, view_rx) = VolumeAggregator::new();
        let config = VolumeDetectionConfig {
            include_local_user: false,
            ..test_config()
        };
        agg.enable(config, Some(UserId::new("me")));

        agg.process_tick(&[sample("me", 0.9), sample("u2", 0.4)]);

        let view = view_rx.borrow().clone();
        assert_eq!(view.users.len(), 1);
        assert_eq!(view.dominant_speaker, Some(UserId::new("u2")));
    }

    #[test]
    fn test_disable_clears_views_and_is_idempotent() {
        let (mut agg, view_rx) = VolumeAggregator::new();
        agg.enable(test_config(), None);
        agg.process_tick(&[sample("u1", 0.5)]);

        agg.disable();
        let view = view_rx.borrow().clone();
        assert!(view.users.is_empty());
        assert!(view.speaking_users.is_empty());
        assert!(view.dominant_speaker.is_none());

        // Second disable is a no-op
        agg.disable();
        assert!(!agg.is_enabled());
    }

    #[test]
    fn test_ticks_while_disabled_are_dropped() {
        let (mut agg, view_rx) = VolumeAggregator::new();
        assert!(agg.process_tick(&[sample("u1", 0.5)]).is_none());
        assert!(view_rx.borrow().users.is_empty());
    }

    #[test]
    fn test_enable_while_enabled_reconfigures() {
        let (mut agg, view_rx) = VolumeAggregator::new();
        agg.enable(test_config(), None);
        agg.process_tick(&[sample("u1", 0.5)]);

        // Re-enable with a stricter threshold; the stale view is cleared
        // and the new config takes effect immediately.
        let strict = VolumeDetectionConfig {
            speaking_threshold: 0.8,
            ..test_config()
        };
        agg.enable(strict, None);
        assert!(view_rx.borrow().users.is_empty());

        agg.process_tick(&[sample("u1", 0.5)]);
        let view = view_rx.borrow().clone();
        assert!(view.speaking_users.is_empty());
        assert!(view.dominant_speaker.is_none());
    }

    #[test]
    fn test_dominant_change_reported_once() {
        let (mut agg, _view_rx) = VolumeAggregator::new();
        agg.enable(test_config(), None);

        // First tick: dominant changes from None to u1
        let change = agg.process_tick(&[sample("u1", 0.5)]);
        assert_eq!(change, Some(Some(UserId::new("u1"))));

        // Same dominant again: no change reported
        let change = agg.process_tick(&[sample("u1", 0.6)]);
        assert!(change.is_none());

        // Everyone goes quiet: change back to None
        let change = agg.process_tick(&[sample("u1", 0.1)]);
        assert_eq!(change, Some(None));
    }
}
