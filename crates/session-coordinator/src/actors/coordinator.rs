//! `CoordinatorActor` - the serialized confinement context for one session.
//!
//! The coordinator owns every piece of session state: the provider pair,
//! the user session, audio settings, the volume aggregator, and the relay
//! and stream-push orchestrators. All mutation happens on the actor's
//! message loop; callers interact through the cloneable
//! [`CoordinatorHandle`] and observe state through published snapshots.
//!
//! Long-running backend calls never block the loop: they are spawned with
//! a child `CancellationToken` and an epoch guard, and report back through
//! the mailbox. At most one such call per resource may be in flight;
//! conflicting requests are rejected with `OperationInProgress`, and
//! teardown operations (leave, logout, stop, teardown) cancel the
//! operation they supersede so its stale completion is dropped.

use super::messages::{CoordinatorMessage, CoordinatorStatus, OpResource};
use super::metrics::{CoordinatorMetrics, MailboxMonitor};
use crate::config::CoordinatorConfig;
use crate::errors::CoordinatorError;
use crate::events::CoordinatorEvent;
use crate::relay::RelayOrchestrator;
use crate::state::{
    AudioSettings, ConnectionState, MediaRelayState, StreamPushState, UserSession,
    VolumeDetectionConfig, VolumeView,
};
use crate::stream_push::StreamPushOrchestrator;
use crate::tokens::{spawn_renewal, RenewTarget, RenewalOutcome, RenewalSchedule, RenewalTask};
use crate::volume::VolumeAggregator;

use provider_api::error::BackendError;
use provider_api::events::ProviderEvent;
use provider_api::factory::{ProviderCapabilities, ProviderFactory, ProviderPair};
use provider_api::token_supply::TokenSupplier;
use provider_api::transport::MediaTransport;
use provider_api::types::{
    ChannelKind, ConnectionChange, MediaRelayConfig, ProviderCredentials, ProviderKind, RoomId,
    StreamLayout, StreamPushConfig, UserId, UserRole,
};

use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Time allowed for best-effort backend calls during teardown.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the internal renewal-outcome channel.
const RENEWAL_CHANNEL_CAPACITY: usize = 16;

type Responder = oneshot::Sender<Result<(), CoordinatorError>>;

/// Handle to the coordinator actor.
///
/// This is the public interface: all methods are async and return results
/// via oneshot channels. Handles are cheap to clone; each coordinator
/// instance is fully self-contained and injectable, with no process-wide
/// state.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
    events: broadcast::Sender<CoordinatorEvent>,
    volume_rx: watch::Receiver<VolumeView>,
    connection_rx: watch::Receiver<ConnectionState>,
}

impl CoordinatorHandle {
    /// Create a new coordinator actor and return a handle to it.
    ///
    /// Spawns the actor task and returns immediately. The factory and
    /// token supplier are explicit collaborators; nothing is read from
    /// global state.
    #[must_use]
    pub fn new(
        config: CoordinatorConfig,
        factory: Arc<dyn ProviderFactory>,
        supplier: Arc<dyn TokenSupplier>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.command_channel_capacity);
        let (event_sender, provider_events) = mpsc::channel(config.event_channel_capacity);
        let (renewal_tx, renewal_rx) = mpsc::channel(RENEWAL_CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(config.broadcast_capacity);
        let (volume, volume_rx) = VolumeAggregator::new();
        let (connection_tx, connection_rx) = watch::channel(ConnectionState::default());
        let cancel_token = CancellationToken::new();
        let coordinator_id = uuid::Uuid::new_v4().to_string();

        let actor = CoordinatorActor {
            mailbox: MailboxMonitor::new(coordinator_id.clone()),
            coordinator_id,
            config,
            factory,
            supplier,
            receiver,
            self_sender: sender.clone(),
            cancel_token: cancel_token.clone(),
            provider_events,
            event_sender,
            renewal_rx,
            renewal_tx,
            events: events.clone(),
            connection_tx,
            providers: None,
            session: None,
            audio: AudioSettings::default(),
            volume,
            relay: RelayOrchestrator::new(),
            push: StreamPushOrchestrator::new(),
            pending: HashMap::new(),
            epoch: 0,
            renewals: HashMap::new(),
            metrics: CoordinatorMetrics::new(),
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
            events,
            volume_rx,
            connection_rx,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> CoordinatorMessage,
    ) -> Result<T, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| CoordinatorError::Internal(format!("channel send failed: {e}")))?;
        rx.await
            .map_err(|e| CoordinatorError::Internal(format!("response receive failed: {e}")))
    }

    /// Build and initialize the provider pair. Valid once per teardown.
    pub async fn configure(
        &self,
        kind: ProviderKind,
        credentials: ProviderCredentials,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::Configure {
            kind,
            credentials,
            respond_to: tx,
        })
        .await?
    }

    /// Drop the provider pair and all derived state.
    pub async fn teardown(&self) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::Teardown { respond_to: tx })
            .await?
    }

    /// Establish the messaging identity and create the session.
    pub async fn login(
        &self,
        user_id: UserId,
        user_name: String,
        role: UserRole,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::Login {
            user_id,
            user_name,
            role,
            respond_to: tx,
        })
        .await?
    }

    /// Destroy the session. Best-effort on the backend, local cleanup
    /// always completes.
    pub async fn logout(&self) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::Logout { respond_to: tx })
            .await?
    }

    /// Join a media room. Requires an active session.
    pub async fn join_room(
        &self,
        room: RoomId,
        token: Option<String>,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::JoinRoom {
            room,
            token,
            respond_to: tx,
        })
        .await?
    }

    /// Leave the current room, resetting relay, push, and volume state.
    pub async fn leave_room(&self) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::LeaveRoom { respond_to: tx })
            .await?
    }

    /// Switch role within the current room.
    pub async fn switch_role(&self, role: UserRole) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::SwitchRole {
            role,
            respond_to: tx,
        })
        .await?
    }

    /// Mute or unmute the local microphone.
    pub async fn set_microphone_muted(&self, muted: bool) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::SetMicrophoneMuted {
            muted,
            respond_to: tx,
        })
        .await?
    }

    /// Start or stop publishing the local audio stream.
    pub async fn set_local_audio_stream_active(
        &self,
        active: bool,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::SetLocalAudioStreamActive {
            active,
            respond_to: tx,
        })
        .await?
    }

    /// Set the audio mixing volume. Values are clamped to `0..=100`.
    pub async fn set_audio_mixing_volume(&self, volume: i32) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::SetAudioMixingVolume {
            volume,
            respond_to: tx,
        })
        .await?
    }

    /// Set the playback signal volume. Values are clamped to `0..=100`.
    pub async fn set_playback_signal_volume(&self, volume: i32) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::SetPlaybackSignalVolume {
            volume,
            respond_to: tx,
        })
        .await?
    }

    /// Set the recording signal volume. Values are clamped to `0..=100`.
    pub async fn set_recording_signal_volume(&self, volume: i32) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::SetRecordingSignalVolume {
            volume,
            respond_to: tx,
        })
        .await?
    }

    /// Apply a persisted audio-settings snapshot without touching the
    /// backend. Intended for startup restore.
    pub async fn restore_audio_settings(
        &self,
        snapshot: AudioSettings,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::RestoreAudioSettings {
            snapshot,
            respond_to: tx,
        })
        .await?
    }

    /// Enable the volume indicator. Enabling while enabled reconfigures.
    pub async fn enable_volume_indicator(
        &self,
        config: VolumeDetectionConfig,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::EnableVolumeIndicator {
            config,
            respond_to: tx,
        })
        .await?
    }

    /// Disable the volume indicator. No-op when already disabled.
    pub async fn disable_volume_indicator(&self) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::DisableVolumeIndicator { respond_to: tx })
            .await?
    }

    /// Start a media relay session.
    pub async fn start_media_relay(
        &self,
        config: MediaRelayConfig,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::StartMediaRelay {
            config,
            respond_to: tx,
        })
        .await?
    }

    /// Replace the destination set of the running relay session.
    pub async fn update_media_relay(
        &self,
        config: MediaRelayConfig,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::UpdateMediaRelay {
            config,
            respond_to: tx,
        })
        .await?
    }

    /// Pause relaying into one destination channel.
    pub async fn pause_media_relay(&self, channel: String) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::PauseMediaRelay {
            channel,
            respond_to: tx,
        })
        .await?
    }

    /// Resume relaying into one destination channel.
    pub async fn resume_media_relay(&self, channel: String) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::ResumeMediaRelay {
            channel,
            respond_to: tx,
        })
        .await?
    }

    /// Stop the relay session. Best-effort on the backend; local state
    /// always returns to idle.
    pub async fn stop_media_relay(&self) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::StopMediaRelay { respond_to: tx })
            .await?
    }

    /// Start pushing a transcoded stream.
    pub async fn start_stream_push(
        &self,
        config: StreamPushConfig,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::StartStreamPush {
            config,
            respond_to: tx,
        })
        .await?
    }

    /// Update the layout of the running transcoded stream.
    pub async fn update_stream_push_layout(
        &self,
        layout: StreamLayout,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::UpdateStreamPushLayout {
            layout,
            respond_to: tx,
        })
        .await?
    }

    /// Stop the transcoded stream.
    pub async fn stop_stream_push(&self) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::StopStreamPush { respond_to: tx })
            .await?
    }

    /// Send a message to a single peer. Requires login.
    pub async fn send_peer_message(
        &self,
        user: UserId,
        payload: String,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::SendPeerMessage {
            user,
            payload,
            respond_to: tx,
        })
        .await?
    }

    /// Send a message to a channel. Requires login.
    pub async fn send_channel_message(
        &self,
        channel: String,
        payload: String,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::SendChannelMessage {
            channel,
            payload,
            respond_to: tx,
        })
        .await?
    }

    /// Join a messaging channel. Requires login.
    pub async fn join_channel(&self, channel: String) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::JoinChannel {
            channel,
            respond_to: tx,
        })
        .await?
    }

    /// Leave a messaging channel. Requires login.
    pub async fn leave_channel(&self, channel: String) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::LeaveChannel {
            channel,
            respond_to: tx,
        })
        .await?
    }

    /// Set attributes on the logged-in user.
    pub async fn set_user_attributes(
        &self,
        attributes: HashMap<String, String>,
    ) -> Result<(), CoordinatorError> {
        self.request(|tx| CoordinatorMessage::SetUserAttributes {
            attributes,
            respond_to: tx,
        })
        .await?
    }

    /// Get the attributes of a user.
    pub async fn user_attributes(
        &self,
        user: UserId,
    ) -> Result<HashMap<String, String>, CoordinatorError> {
        self.request(|tx| CoordinatorMessage::GetUserAttributes {
            user,
            respond_to: tx,
        })
        .await?
    }

    /// Get the current session snapshot, if logged in.
    pub async fn session(&self) -> Result<Option<UserSession>, CoordinatorError> {
        self.request(|tx| CoordinatorMessage::GetSession { respond_to: tx })
            .await
    }

    /// Get the current audio settings snapshot.
    pub async fn audio_settings(&self) -> Result<AudioSettings, CoordinatorError> {
        self.request(|tx| CoordinatorMessage::GetAudioSettings { respond_to: tx })
            .await
    }

    /// Get the current media relay snapshot.
    pub async fn relay_state(&self) -> Result<MediaRelayState, CoordinatorError> {
        self.request(|tx| CoordinatorMessage::GetRelayState { respond_to: tx })
            .await
    }

    /// Get the current stream push state.
    pub async fn stream_push_state(&self) -> Result<StreamPushState, CoordinatorError> {
        self.request(|tx| CoordinatorMessage::GetStreamPushState { respond_to: tx })
            .await
    }

    /// Get the capabilities of the configured provider pair, if any.
    pub async fn capabilities(&self) -> Result<Option<ProviderCapabilities>, CoordinatorError> {
        self.request(|tx| CoordinatorMessage::GetCapabilities { respond_to: tx })
            .await
    }

    /// Get the current coordinator status, for health checks.
    pub async fn status(&self) -> Result<CoordinatorStatus, CoordinatorError> {
        self.request(|tx| CoordinatorMessage::GetStatus { respond_to: tx })
            .await
    }

    /// Subscribe to coordinator events. Slow subscribers lag and miss
    /// events; they never stall the actor.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Watch the published volume view. Slow readers observe the latest
    /// view and miss intermediate ticks.
    #[must_use]
    pub fn watch_volume(&self) -> watch::Receiver<VolumeView> {
        self.volume_rx.clone()
    }

    /// Watch the media connection state.
    #[must_use]
    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection_rx.clone()
    }

    /// The current media connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection_rx.borrow().clone()
    }

    /// The current volume view.
    #[must_use]
    pub fn volume_view(&self) -> VolumeView {
        self.volume_rx.borrow().clone()
    }

    /// Cancel the actor (immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// What to commit when a spawned backend operation completes.
enum PendingKind {
    Configure { pair: ProviderPair },
    Login { session: UserSession },
    Join { room: RoomId },
    RelayStart,
    PushStart,
    PushStop,
}

/// A spawned backend operation awaiting completion.
struct PendingOp {
    epoch: u64,
    kind: PendingKind,
    cancel: CancellationToken,
    respond_to: Responder,
}

/// The coordinator actor implementation.
///
/// Owns the actor state and runs the message loop.
pub struct CoordinatorActor {
    /// Instance id, for log correlation.
    coordinator_id: String,
    config: CoordinatorConfig,
    factory: Arc<dyn ProviderFactory>,
    supplier: Arc<dyn TokenSupplier>,
    /// Command mailbox.
    receiver: mpsc::Receiver<CoordinatorMessage>,
    /// Sender clone handed to spawned operations for completions.
    self_sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
    /// Provider event stream.
    provider_events: mpsc::Receiver<ProviderEvent>,
    /// Sender half cloned into the factory at configure. Holding one clone
    /// here keeps `recv()` from yielding `None` between provider pairs.
    event_sender: mpsc::Sender<ProviderEvent>,
    /// Renewal task outcomes.
    renewal_rx: mpsc::Receiver<RenewalOutcome>,
    renewal_tx: mpsc::Sender<RenewalOutcome>,
    /// Broadcast channel for coordinator events.
    events: broadcast::Sender<CoordinatorEvent>,
    /// Published media connection state.
    connection_tx: watch::Sender<ConnectionState>,
    /// The configured provider pair, if any.
    providers: Option<ProviderPair>,
    /// The live session, if logged in.
    session: Option<UserSession>,
    audio: AudioSettings,
    volume: VolumeAggregator,
    relay: RelayOrchestrator,
    push: StreamPushOrchestrator,
    /// In-flight spawned backend operations, one per resource.
    pending: HashMap<OpResource, PendingOp>,
    /// Monotonic guard against stale completions.
    epoch: u64,
    /// Active token renewal tasks, one per channel.
    renewals: HashMap<ChannelKind, RenewalTask>,
    metrics: Arc<CoordinatorMetrics>,
    mailbox: MailboxMonitor,
}

impl CoordinatorActor {
    /// Run the actor message loop.
    #[instrument(skip_all, name = "coordinator.actor", fields(coordinator_id = %self.coordinator_id))]
    async fn run(mut self) {
        info!(
            target: "coordinator.actor",
            coordinator_id = %self.coordinator_id,
            "CoordinatorActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "coordinator.actor",
                        coordinator_id = %self.coordinator_id,
                        "CoordinatorActor received cancellation signal"
                    );
                    self.shutdown();
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                        }
                        None => {
                            info!(
                                target: "coordinator.actor",
                                coordinator_id = %self.coordinator_id,
                                "CoordinatorActor channel closed, exiting"
                            );
                            self.shutdown();
                            break;
                        }
                    }
                }

                event = self.provider_events.recv() => {
                    // The actor keeps a sender clone, so recv never yields None
                    if let Some(event) = event {
                        self.handle_provider_event(event);
                    }
                }

                outcome = self.renewal_rx.recv() => {
                    if let Some(outcome) = outcome {
                        self.handle_renewal_outcome(outcome);
                    }
                }
            }
        }

        info!(
            target: "coordinator.actor",
            coordinator_id = %self.coordinator_id,
            messages_processed = self.mailbox.messages_processed(),
            "CoordinatorActor stopped"
        );
    }

    /// Handle a single mailbox message.
    async fn handle_message(&mut self, message: CoordinatorMessage) {
        if !matches!(message, CoordinatorMessage::OpCompleted { .. }) {
            self.metrics.record_operation();
        }

        match message {
            CoordinatorMessage::Configure {
                kind,
                credentials,
                respond_to,
            } => self.handle_configure(kind, credentials, respond_to),

            CoordinatorMessage::Teardown { respond_to } => {
                let result = self.handle_teardown();
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::Login {
                user_id,
                user_name,
                role,
                respond_to,
            } => self.handle_login(user_id, user_name, role, respond_to),

            CoordinatorMessage::Logout { respond_to } => {
                let result = self.handle_logout();
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::JoinRoom {
                room,
                token,
                respond_to,
            } => self.handle_join_room(room, token, respond_to),

            CoordinatorMessage::LeaveRoom { respond_to } => {
                let result = self.handle_leave_room();
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SwitchRole { role, respond_to } => {
                let result = self.switch_role(role).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SetMicrophoneMuted { muted, respond_to } => {
                let result = self.set_microphone_muted(muted).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SetLocalAudioStreamActive { active, respond_to } => {
                let result = self.set_local_audio_stream_active(active).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SetAudioMixingVolume { volume, respond_to } => {
                let result = self.set_audio_mixing_volume(volume).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SetPlaybackSignalVolume { volume, respond_to } => {
                let result = self.set_playback_signal_volume(volume).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SetRecordingSignalVolume { volume, respond_to } => {
                let result = self.set_recording_signal_volume(volume).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::RestoreAudioSettings {
                snapshot,
                respond_to,
            } => {
                // Startup restore is local-only and not re-broadcast, so a
                // persistence subscriber does not see its own write echoed.
                self.audio = snapshot;
                let _ = respond_to.send(Ok(()));
            }

            CoordinatorMessage::EnableVolumeIndicator { config, respond_to } => {
                let result = self.enable_volume_indicator(config).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::DisableVolumeIndicator { respond_to } => {
                let result = self.disable_volume_indicator().await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::StartMediaRelay { config, respond_to } => {
                self.handle_relay_start(config, respond_to);
            }

            CoordinatorMessage::UpdateMediaRelay { config, respond_to } => {
                let result = self.update_media_relay(config).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::PauseMediaRelay {
                channel,
                respond_to,
            } => {
                let result = self.pause_media_relay(channel).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::ResumeMediaRelay {
                channel,
                respond_to,
            } => {
                let result = self.resume_media_relay(channel).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::StopMediaRelay { respond_to } => {
                let result = self.handle_relay_stop();
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::StartStreamPush { config, respond_to } => {
                self.handle_push_start(config, respond_to);
            }

            CoordinatorMessage::UpdateStreamPushLayout { layout, respond_to } => {
                let result = self.update_stream_push_layout(layout).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::StopStreamPush { respond_to } => {
                self.handle_push_stop(respond_to);
            }

            CoordinatorMessage::SendPeerMessage {
                user,
                payload,
                respond_to,
            } => {
                let result = self.send_peer_message(user, payload).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SendChannelMessage {
                channel,
                payload,
                respond_to,
            } => {
                let result = self.send_channel_message(channel, payload).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::JoinChannel {
                channel,
                respond_to,
            } => {
                let result = self.join_channel(channel).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::LeaveChannel {
                channel,
                respond_to,
            } => {
                let result = self.leave_channel(channel).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SetUserAttributes {
                attributes,
                respond_to,
            } => {
                let result = self.set_user_attributes(attributes).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::GetUserAttributes { user, respond_to } => {
                let result = self.user_attributes(user).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::GetSession { respond_to } => {
                let _ = respond_to.send(self.session.clone());
            }

            CoordinatorMessage::GetAudioSettings { respond_to } => {
                let _ = respond_to.send(self.audio.clone());
            }

            CoordinatorMessage::GetRelayState { respond_to } => {
                let _ = respond_to.send(self.relay.state());
            }

            CoordinatorMessage::GetStreamPushState { respond_to } => {
                let _ = respond_to.send(self.push.state());
            }

            CoordinatorMessage::GetCapabilities { respond_to } => {
                let _ = respond_to.send(self.providers.as_ref().map(|p| p.capabilities));
            }

            CoordinatorMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(CoordinatorStatus {
                    configured: self.providers.is_some(),
                    logged_in: self.session.is_some(),
                    in_room: self
                        .session
                        .as_ref()
                        .is_some_and(|s| s.room_id.is_some()),
                    pending_ops: self.pending.len(),
                    mailbox_depth: self.mailbox.current_depth(),
                });
            }

            CoordinatorMessage::OpCompleted {
                resource,
                epoch,
                result,
            } => self.handle_op_completed(resource, epoch, result),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn handle_configure(
        &mut self,
        kind: ProviderKind,
        credentials: ProviderCredentials,
        respond_to: Responder,
    ) {
        if self.providers.is_some() {
            let _ = respond_to.send(Err(self.rejected(CoordinatorError::Configuration(
                "provider already configured; teardown first".to_string(),
            ))));
            return;
        }
        if let Err(e) = self.ensure_no_pending(OpResource::Provider, "configure") {
            let _ = respond_to.send(Err(e));
            return;
        }

        let pair = match self.factory.create(&kind, self.event_sender.clone()) {
            Ok(pair) => pair,
            Err(e) => {
                let _ = respond_to.send(Err(CoordinatorError::Backend(e)));
                return;
            }
        };

        info!(
            target: "coordinator.actor",
            coordinator_id = %self.coordinator_id,
            provider = %kind,
            "Initializing provider pair"
        );

        let media = pair.media.clone();
        let messaging = pair.messaging.clone();
        self.spawn_op(
            OpResource::Provider,
            PendingKind::Configure { pair },
            respond_to,
            async move {
                media.initialize(&credentials).await?;
                messaging.initialize(&credentials).await
            },
        );
    }

    fn handle_teardown(&mut self) -> Result<(), CoordinatorError> {
        if self.providers.is_none() && !self.pending.contains_key(&OpResource::Provider) {
            return Err(self.rejected(CoordinatorError::InvalidState(
                "provider not configured".to_string(),
            )));
        }

        for resource in [
            OpResource::Provider,
            OpResource::Session,
            OpResource::Room,
            OpResource::Relay,
            OpResource::Push,
        ] {
            self.supersede(resource, "teardown");
        }

        if let Some(pair) = &self.providers {
            let in_room = self
                .session
                .as_ref()
                .is_some_and(|s| s.room_id.is_some());
            if in_room {
                let media = pair.media.clone();
                self.spawn_best_effort("leave_room", async move { media.leave_room().await });
            }
            if self.session.is_some() {
                let messaging = pair.messaging.clone();
                self.spawn_best_effort("logout", async move { messaging.logout().await });
            }
        }

        self.session = None;
        self.clear_room_state();
        for (_, task) in self.renewals.drain() {
            task.cancel();
        }
        self.providers = None;

        info!(
            target: "coordinator.actor",
            coordinator_id = %self.coordinator_id,
            "Provider pair torn down"
        );
        Ok(())
    }

    fn handle_login(
        &mut self,
        user_id: UserId,
        user_name: String,
        role: UserRole,
        respond_to: Responder,
    ) {
        let messaging = match self.providers_ref() {
            Ok(pair) => pair.messaging.clone(),
            Err(e) => {
                let _ = respond_to.send(Err(e));
                return;
            }
        };
        if self.session.is_some() {
            let _ = respond_to.send(Err(self.rejected(CoordinatorError::InvalidState(
                "already logged in".to_string(),
            ))));
            return;
        }
        if let Err(e) = self.ensure_no_pending(OpResource::Session, "login") {
            let _ = respond_to.send(Err(e));
            return;
        }

        let session = UserSession {
            user_id: user_id.clone(),
            user_name,
            role,
            room_id: None,
            join_time: Utc::now(),
        };

        self.spawn_op(
            OpResource::Session,
            PendingKind::Login { session },
            respond_to,
            async move { messaging.login(&user_id, None).await },
        );
    }

    fn handle_logout(&mut self) -> Result<(), CoordinatorError> {
        if self.session.is_none() && !self.pending.contains_key(&OpResource::Session) {
            return Err(self.rejected(CoordinatorError::NoActiveSession(
                "logout requires a login".to_string(),
            )));
        }

        self.supersede(OpResource::Session, "logout");
        self.supersede(OpResource::Room, "logout");
        self.supersede(OpResource::Relay, "logout");
        self.supersede(OpResource::Push, "logout");

        if let Some(pair) = &self.providers {
            let in_room = self
                .session
                .as_ref()
                .is_some_and(|s| s.room_id.is_some());
            if in_room {
                let media = pair.media.clone();
                self.spawn_best_effort("leave_room", async move { media.leave_room().await });
            }
            let messaging = pair.messaging.clone();
            self.spawn_best_effort("logout", async move { messaging.logout().await });
        }

        self.session = None;
        self.clear_room_state();
        if let Some(task) = self.renewals.remove(&ChannelKind::Messaging) {
            task.cancel();
        }

        info!(
            target: "coordinator.actor",
            coordinator_id = %self.coordinator_id,
            "Session logged out"
        );
        Ok(())
    }

    fn handle_join_room(&mut self, room: RoomId, token: Option<String>, respond_to: Responder) {
        let media = match self.providers_ref() {
            Ok(pair) => pair.media.clone(),
            Err(e) => {
                let _ = respond_to.send(Err(e));
                return;
            }
        };
        let (user, role) = match self.session.as_ref() {
            Some(session) if session.room_id.is_some() => {
                let _ = respond_to.send(Err(self.rejected(CoordinatorError::InvalidState(
                    "already in a room; leave first".to_string(),
                ))));
                return;
            }
            Some(session) => (session.user_id.clone(), session.role),
            None => {
                let _ = respond_to.send(Err(self.rejected(CoordinatorError::NoActiveSession(
                    "join_room requires a login".to_string(),
                ))));
                return;
            }
        };
        if let Err(e) = self.ensure_no_pending(OpResource::Room, "join_room") {
            let _ = respond_to.send(Err(e));
            return;
        }

        self.set_connection_state(ConnectionState::Connecting);

        let room_for_join = room.clone();
        self.spawn_op(
            OpResource::Room,
            PendingKind::Join { room },
            respond_to,
            async move {
                media
                    .join_room(&room_for_join, &user, role, token.as_deref())
                    .await
            },
        );
    }

    fn handle_leave_room(&mut self) -> Result<(), CoordinatorError> {
        let in_room = self
            .session
            .as_ref()
            .is_some_and(|s| s.room_id.is_some());
        if !in_room && !self.pending.contains_key(&OpResource::Room) {
            return Err(self.rejected(CoordinatorError::NoActiveSession(
                "leave_room requires a joined room".to_string(),
            )));
        }

        self.supersede(OpResource::Room, "leave_room");
        self.supersede(OpResource::Relay, "leave_room");
        self.supersede(OpResource::Push, "leave_room");

        if let Some(pair) = &self.providers {
            let media = pair.media.clone();
            self.spawn_best_effort("leave_room", async move { media.leave_room().await });
        }

        self.clear_room_state();
        Ok(())
    }

    /// Reset everything scoped to room membership.
    ///
    /// The next join must not inherit relay, push, or volume state.
    fn clear_room_state(&mut self) {
        if let Some(session) = &mut self.session {
            session.room_id = None;
        }
        self.relay.reset();
        self.push.reset();
        self.volume.disable();
        if let Some(task) = self.renewals.remove(&ChannelKind::Media) {
            task.cancel();
        }
        self.set_connection_state(ConnectionState::Disconnected);
        self.publish_relay();
        self.publish_push();
        self.broadcast(CoordinatorEvent::SessionChanged(self.session.clone()));
    }

    async fn switch_role(&mut self, role: UserRole) -> Result<(), CoordinatorError> {
        let media = self.providers_ref()?.media.clone();
        self.require_room("switch_role")?;

        // Optimistic local change; not reverted if the backend call fails
        if let Some(session) = &mut self.session {
            session.role = role;
        }
        self.broadcast(CoordinatorEvent::SessionChanged(self.session.clone()));

        media.switch_role(role).await?;
        if role.can_publish_audio() {
            media.resume_local_audio_stream().await?;
        } else {
            media.stop_local_audio_stream().await?;
        }
        self.audio.local_audio_stream_active = role.can_publish_audio();
        self.touch_audio();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Audio settings
    // ------------------------------------------------------------------

    async fn set_microphone_muted(&mut self, muted: bool) -> Result<(), CoordinatorError> {
        let media = self.providers_ref()?.media.clone();
        media.mute_local_audio(muted).await?;
        self.audio.microphone_muted = muted;
        self.touch_audio();
        Ok(())
    }

    async fn set_local_audio_stream_active(
        &mut self,
        active: bool,
    ) -> Result<(), CoordinatorError> {
        let media = self.providers_ref()?.media.clone();
        if active {
            media.resume_local_audio_stream().await?;
        } else {
            media.stop_local_audio_stream().await?;
        }
        self.audio.local_audio_stream_active = active;
        self.touch_audio();
        Ok(())
    }

    async fn set_audio_mixing_volume(&mut self, volume: i32) -> Result<(), CoordinatorError> {
        let media = self.providers_ref()?.media.clone();
        let clamped = AudioSettings::clamp_volume(volume);
        media.set_audio_mixing_volume(clamped).await?;
        self.audio.audio_mixing_volume = clamped;
        self.touch_audio();
        Ok(())
    }

    async fn set_playback_signal_volume(&mut self, volume: i32) -> Result<(), CoordinatorError> {
        let media = self.providers_ref()?.media.clone();
        let clamped = AudioSettings::clamp_volume(volume);
        media.set_playback_signal_volume(clamped).await?;
        self.audio.playback_signal_volume = clamped;
        self.touch_audio();
        Ok(())
    }

    async fn set_recording_signal_volume(&mut self, volume: i32) -> Result<(), CoordinatorError> {
        let media = self.providers_ref()?.media.clone();
        let clamped = AudioSettings::clamp_volume(volume);
        media.set_recording_signal_volume(clamped).await?;
        self.audio.recording_signal_volume = clamped;
        self.touch_audio();
        Ok(())
    }

    fn touch_audio(&mut self) {
        self.audio.last_modified = Utc::now();
        self.broadcast(CoordinatorEvent::AudioSettingsChanged(self.audio.clone()));
    }

    // ------------------------------------------------------------------
    // Volume indicator
    // ------------------------------------------------------------------

    async fn enable_volume_indicator(
        &mut self,
        config: VolumeDetectionConfig,
    ) -> Result<(), CoordinatorError> {
        let pair = self.providers_ref()?;
        if !pair.capabilities.volume_indicator {
            return Err(self.rejected(CoordinatorError::Backend(BackendError::Unsupported(
                "volume indicator",
            ))));
        }
        let media = pair.media.clone();

        // Reconfigure cycles the backend: the previous detection is torn
        // down before the new interval is enabled
        if self.volume.is_enabled() {
            if let Err(e) = media.disable_volume_indicator().await {
                warn!(
                    target: "coordinator.actor",
                    coordinator_id = %self.coordinator_id,
                    error = %e,
                    "Backend disable during volume indicator reconfigure failed"
                );
            }
        }

        media
            .enable_volume_indicator(config.detection_interval)
            .await?;
        let local_user = self.session.as_ref().map(|s| s.user_id.clone());
        self.volume.enable(config, local_user);
        Ok(())
    }

    async fn disable_volume_indicator(&mut self) -> Result<(), CoordinatorError> {
        if !self.volume.is_enabled() {
            return Ok(());
        }
        if let Some(pair) = &self.providers {
            let media = pair.media.clone();
            if let Err(e) = media.disable_volume_indicator().await {
                warn!(
                    target: "coordinator.actor",
                    coordinator_id = %self.coordinator_id,
                    error = %e,
                    "Backend disable of volume indicator failed; clearing local state anyway"
                );
            }
        }
        self.volume.disable();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Media relay
    // ------------------------------------------------------------------

    fn relay_media(&self) -> Result<Arc<dyn MediaTransport>, CoordinatorError> {
        let pair = self.providers_ref()?;
        if !pair.capabilities.media_relay {
            return Err(self.rejected(CoordinatorError::Backend(BackendError::Unsupported(
                "media relay",
            ))));
        }
        Ok(pair.media.clone())
    }

    fn handle_relay_start(&mut self, config: MediaRelayConfig, respond_to: Responder) {
        let media = match self.relay_media() {
            Ok(media) => media,
            Err(e) => {
                let _ = respond_to.send(Err(e));
                return;
            }
        };
        if let Err(e) = self.require_room("start_media_relay") {
            let _ = respond_to.send(Err(e));
            return;
        }
        if let Err(e) = self.ensure_no_pending(OpResource::Relay, "start_media_relay") {
            let _ = respond_to.send(Err(e));
            return;
        }
        if let Err(e) = self.relay.begin_start(config.clone()) {
            self.metrics.record_rejection(e.kind());
            let _ = respond_to.send(Err(e));
            return;
        }
        self.publish_relay();

        self.spawn_op(
            OpResource::Relay,
            PendingKind::RelayStart,
            respond_to,
            async move { media.start_media_relay(&config).await },
        );
    }

    async fn update_media_relay(
        &mut self,
        config: MediaRelayConfig,
    ) -> Result<(), CoordinatorError> {
        let media = self.relay_media()?;
        RelayOrchestrator::validate(&config)?;
        self.relay.ensure_active()?;

        media.update_media_relay(&config).await?;
        self.relay.apply_update(config);
        self.publish_relay();
        Ok(())
    }

    async fn pause_media_relay(&mut self, channel: String) -> Result<(), CoordinatorError> {
        let media = self.relay_media()?;
        self.relay.ensure_can_pause(&channel)?;

        media.pause_media_relay(&channel).await?;
        self.relay.mark_paused(&channel);
        self.publish_relay();
        Ok(())
    }

    async fn resume_media_relay(&mut self, channel: String) -> Result<(), CoordinatorError> {
        let media = self.relay_media()?;
        self.relay.ensure_can_resume(&channel)?;

        media.resume_media_relay(&channel).await?;
        self.relay.mark_running(&channel);
        self.publish_relay();
        Ok(())
    }

    fn handle_relay_stop(&mut self) -> Result<(), CoordinatorError> {
        let media = self.relay_media()?;
        if self.relay.is_idle() && !self.pending.contains_key(&OpResource::Relay) {
            return Err(self.rejected(CoordinatorError::InvalidState(
                "no relay session active".to_string(),
            )));
        }

        self.supersede(OpResource::Relay, "stop_media_relay");
        self.spawn_best_effort("stop_media_relay", async move {
            media.stop_media_relay().await
        });
        self.relay.reset();
        self.publish_relay();
        Ok(())
    }

    fn publish_relay(&self) {
        self.broadcast(CoordinatorEvent::RelayStateChanged(self.relay.state()));
    }

    // ------------------------------------------------------------------
    // Stream push
    // ------------------------------------------------------------------

    fn push_media(&self) -> Result<Arc<dyn MediaTransport>, CoordinatorError> {
        let pair = self.providers_ref()?;
        if !pair.capabilities.stream_push {
            return Err(self.rejected(CoordinatorError::Backend(BackendError::Unsupported(
                "stream push",
            ))));
        }
        Ok(pair.media.clone())
    }

    fn handle_push_start(&mut self, config: StreamPushConfig, respond_to: Responder) {
        let media = match self.push_media() {
            Ok(media) => media,
            Err(e) => {
                let _ = respond_to.send(Err(e));
                return;
            }
        };
        if let Err(e) = self.require_room("start_stream_push") {
            let _ = respond_to.send(Err(e));
            return;
        }
        if let Err(e) = self.ensure_no_pending(OpResource::Push, "start_stream_push") {
            let _ = respond_to.send(Err(e));
            return;
        }
        if let Err(e) = self.push.begin_start(config.clone()) {
            self.metrics.record_rejection(e.kind());
            let _ = respond_to.send(Err(e));
            return;
        }
        self.publish_push();

        self.spawn_op(
            OpResource::Push,
            PendingKind::PushStart,
            respond_to,
            async move { media.start_stream_push(&config).await },
        );
    }

    async fn update_stream_push_layout(
        &mut self,
        layout: StreamLayout,
    ) -> Result<(), CoordinatorError> {
        let media = self.push_media()?;
        self.push.ensure_can_update_layout()?;
        media.update_stream_push_layout(&layout).await?;
        Ok(())
    }

    fn handle_push_stop(&mut self, respond_to: Responder) {
        let media = match self.push_media() {
            Ok(media) => media,
            Err(e) => {
                let _ = respond_to.send(Err(e));
                return;
            }
        };

        self.supersede(OpResource::Push, "stop_stream_push");
        if let Err(e) = self.push.begin_stop() {
            self.metrics.record_rejection(e.kind());
            let _ = respond_to.send(Err(e));
            return;
        }
        self.publish_push();

        self.spawn_op(
            OpResource::Push,
            PendingKind::PushStop,
            respond_to,
            async move { media.stop_stream_push().await },
        );
    }

    fn publish_push(&self) {
        self.broadcast(CoordinatorEvent::StreamPushStateChanged(self.push.state()));
    }

    // ------------------------------------------------------------------
    // Messaging pass-throughs
    // ------------------------------------------------------------------

    async fn send_peer_message(
        &mut self,
        user: UserId,
        payload: String,
    ) -> Result<(), CoordinatorError> {
        let messaging = self.providers_ref()?.messaging.clone();
        self.require_session("send_peer_message")?;
        messaging.send_peer_message(&user, &payload).await?;
        Ok(())
    }

    async fn send_channel_message(
        &mut self,
        channel: String,
        payload: String,
    ) -> Result<(), CoordinatorError> {
        let messaging = self.providers_ref()?.messaging.clone();
        self.require_session("send_channel_message")?;
        messaging.send_channel_message(&channel, &payload).await?;
        Ok(())
    }

    async fn join_channel(&mut self, channel: String) -> Result<(), CoordinatorError> {
        let messaging = self.providers_ref()?.messaging.clone();
        self.require_session("join_channel")?;
        messaging.join_channel(&channel).await?;
        Ok(())
    }

    async fn leave_channel(&mut self, channel: String) -> Result<(), CoordinatorError> {
        let messaging = self.providers_ref()?.messaging.clone();
        self.require_session("leave_channel")?;
        messaging.leave_channel(&channel).await?;
        Ok(())
    }

    async fn set_user_attributes(
        &mut self,
        attributes: HashMap<String, String>,
    ) -> Result<(), CoordinatorError> {
        let messaging = self.providers_ref()?.messaging.clone();
        self.require_session("set_user_attributes")?;
        messaging.set_user_attributes(&attributes).await?;
        Ok(())
    }

    async fn user_attributes(
        &mut self,
        user: UserId,
    ) -> Result<HashMap<String, String>, CoordinatorError> {
        let messaging = self.providers_ref()?.messaging.clone();
        self.require_session("user_attributes")?;
        Ok(messaging.user_attributes(&user).await?)
    }

    // ------------------------------------------------------------------
    // Provider events
    // ------------------------------------------------------------------

    fn handle_provider_event(&mut self, event: ProviderEvent) {
        self.metrics.record_provider_event(event.name());

        match event {
            ProviderEvent::ConnectionChanged {
                channel: ChannelKind::Media,
                change,
            } => {
                let next = match change {
                    ConnectionChange::Connected => ConnectionState::Connected,
                    ConnectionChange::Reconnecting => ConnectionState::Reconnecting,
                    ConnectionChange::Disconnected => ConnectionState::Disconnected,
                    ConnectionChange::Failed(reason) => ConnectionState::Failed(reason),
                };
                self.set_connection_state(next);
            }

            ProviderEvent::ConnectionChanged {
                channel: ChannelKind::Messaging,
                change,
            } => {
                self.broadcast(CoordinatorEvent::MessagingConnectionChanged(change));
            }

            ProviderEvent::TokenWillExpire {
                channel,
                expires_in,
            } => self.schedule_renewal(channel, expires_in),

            ProviderEvent::VolumeReport(samples) => {
                self.metrics.record_volume_tick();
                if let Some(change) = self.volume.process_tick(&samples) {
                    self.broadcast(CoordinatorEvent::DominantSpeakerChanged(change));
                }
            }

            ProviderEvent::ActiveSpeaker(user) => {
                self.broadcast(CoordinatorEvent::ActiveSpeaker(user));
            }

            ProviderEvent::RelayChannelError { channel, reason } => {
                warn!(
                    target: "coordinator.actor",
                    coordinator_id = %self.coordinator_id,
                    channel = %channel,
                    reason = %reason,
                    "Relay destination channel failed"
                );
                self.relay.channel_error(&channel, reason);
                self.publish_relay();
            }

            ProviderEvent::StreamPushError { reason } => {
                warn!(
                    target: "coordinator.actor",
                    coordinator_id = %self.coordinator_id,
                    reason = %reason,
                    "Stream push failed on the backend"
                );
                self.push.backend_error(reason);
                self.publish_push();
            }

            ProviderEvent::PeerMessage { from, payload } => {
                self.broadcast(CoordinatorEvent::PeerMessageReceived { from, payload });
            }

            ProviderEvent::ChannelMessage {
                channel,
                from,
                payload,
            } => {
                self.broadcast(CoordinatorEvent::ChannelMessageReceived {
                    channel,
                    from,
                    payload,
                });
            }

            ProviderEvent::PeerOnlineStatus { user, online } => {
                self.broadcast(CoordinatorEvent::PeerOnlineStatusChanged { user, online });
            }
        }
    }

    // ------------------------------------------------------------------
    // Token renewal
    // ------------------------------------------------------------------

    fn schedule_renewal(&mut self, channel: ChannelKind, expires_in: Duration) {
        let Some(pair) = &self.providers else {
            return;
        };
        let target = match channel {
            ChannelKind::Media => RenewTarget::Media(pair.media.clone()),
            ChannelKind::Messaging => RenewTarget::Messaging(pair.messaging.clone()),
        };

        // A newer expiry warning replaces any pending renewal for the channel
        if let Some(previous) = self.renewals.remove(&channel) {
            previous.cancel();
        }

        debug!(
            target: "coordinator.actor",
            coordinator_id = %self.coordinator_id,
            channel = channel.as_str(),
            expires_in_secs = expires_in.as_secs(),
            "Scheduling token renewal"
        );

        let task = spawn_renewal(
            RenewalSchedule::from(&self.config),
            target,
            self.supplier.clone(),
            expires_in,
            self.renewal_tx.clone(),
        );
        self.renewals.insert(channel, task);
    }

    fn handle_renewal_outcome(&mut self, outcome: RenewalOutcome) {
        match outcome {
            RenewalOutcome::Renewed { channel } => {
                self.renewals.remove(&channel);
                self.metrics.record_renewal(channel.as_str());
                self.broadcast(CoordinatorEvent::TokenRenewed { channel });
            }
            RenewalOutcome::Failed { channel, attempts } => {
                self.renewals.remove(&channel);
                self.metrics.record_renewal_failure(channel.as_str());
                warn!(
                    target: "coordinator.actor",
                    coordinator_id = %self.coordinator_id,
                    channel = channel.as_str(),
                    attempts,
                    "Token renewal exhausted; session left up for the subscriber to decide"
                );
                self.broadcast(CoordinatorEvent::TokenRenewalFailed { channel, attempts });
            }
        }
    }

    // ------------------------------------------------------------------
    // Spawned operation plumbing
    // ------------------------------------------------------------------

    /// Spawn a long-running backend call off the actor loop.
    ///
    /// The completion comes back through the mailbox tagged with the epoch;
    /// a superseded operation's completion no longer matches and is dropped.
    fn spawn_op<F>(
        &mut self,
        resource: OpResource,
        kind: PendingKind,
        respond_to: Responder,
        operation: F,
    ) where
        F: Future<Output = Result<(), BackendError>> + Send + 'static,
    {
        self.epoch += 1;
        let epoch = self.epoch;
        let cancel = self.cancel_token.child_token();
        let op_cancel = cancel.clone();
        let sender = self.self_sender.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = op_cancel.cancelled() => {}
                result = operation => {
                    let _ = sender
                        .send(CoordinatorMessage::OpCompleted { resource, epoch, result })
                        .await;
                }
            }
        });

        self.pending.insert(
            resource,
            PendingOp {
                epoch,
                kind,
                cancel,
                respond_to,
            },
        );
    }

    fn handle_op_completed(
        &mut self,
        resource: OpResource,
        epoch: u64,
        result: Result<(), BackendError>,
    ) {
        let current = self.pending.get(&resource).map(|p| p.epoch);
        if current != Some(epoch) {
            debug!(
                target: "coordinator.actor",
                coordinator_id = %self.coordinator_id,
                resource = resource.as_str(),
                epoch,
                "Dropping stale operation completion"
            );
            return;
        }
        let Some(pending) = self.pending.remove(&resource) else {
            return;
        };

        match pending.kind {
            PendingKind::Configure { pair } => match result {
                Ok(()) => {
                    self.providers = Some(pair);
                    info!(
                        target: "coordinator.actor",
                        coordinator_id = %self.coordinator_id,
                        "Provider pair configured"
                    );
                    let _ = pending.respond_to.send(Ok(()));
                }
                Err(e) => {
                    warn!(
                        target: "coordinator.actor",
                        coordinator_id = %self.coordinator_id,
                        error = %e,
                        "Provider initialization failed"
                    );
                    let _ = pending.respond_to.send(Err(e.into()));
                }
            },

            PendingKind::Login { session } => match result {
                Ok(()) => {
                    self.session = Some(session.clone());
                    self.broadcast(CoordinatorEvent::SessionChanged(Some(session)));
                    let _ = pending.respond_to.send(Ok(()));
                }
                Err(e) => {
                    let _ = pending.respond_to.send(Err(e.into()));
                }
            },

            PendingKind::Join { room } => match result {
                Ok(()) => {
                    if let Some(session) = &mut self.session {
                        session.room_id = Some(room);
                    }
                    self.set_connection_state(ConnectionState::Connected);
                    self.broadcast(CoordinatorEvent::SessionChanged(self.session.clone()));
                    let _ = pending.respond_to.send(Ok(()));
                }
                Err(e) => {
                    // Login survives a failed join; only the connection fails
                    self.set_connection_state(ConnectionState::Failed(e.to_string()));
                    let _ = pending.respond_to.send(Err(e.into()));
                }
            },

            PendingKind::RelayStart => match result {
                Ok(()) => {
                    self.relay.complete_start();
                    self.publish_relay();
                    let _ = pending.respond_to.send(Ok(()));
                }
                Err(e) => {
                    // Back to idle so the caller can retry with a fixed config
                    self.relay.fail_start();
                    self.publish_relay();
                    let _ = pending.respond_to.send(Err(e.into()));
                }
            },

            PendingKind::PushStart => match result {
                Ok(()) => {
                    self.push.complete_start();
                    self.publish_push();
                    let _ = pending.respond_to.send(Ok(()));
                }
                Err(e) => {
                    self.push.fail_start(e.to_string());
                    self.publish_push();
                    let _ = pending.respond_to.send(Err(e.into()));
                }
            },

            PendingKind::PushStop => {
                if let Err(e) = result {
                    warn!(
                        target: "coordinator.actor",
                        coordinator_id = %self.coordinator_id,
                        error = %e,
                        "Backend stream push stop failed; completing local stop anyway"
                    );
                }
                self.push.complete_stop();
                self.publish_push();
                let _ = pending.respond_to.send(Ok(()));
            }
        }
    }

    /// Cancel an in-flight operation superseded by a teardown.
    fn supersede(&mut self, resource: OpResource, by: &'static str) {
        if let Some(pending) = self.pending.remove(&resource) {
            debug!(
                target: "coordinator.actor",
                coordinator_id = %self.coordinator_id,
                resource = resource.as_str(),
                superseded_by = by,
                "Cancelling in-flight operation"
            );
            pending.cancel.cancel();
            let _ = pending
                .respond_to
                .send(Err(CoordinatorError::InvalidState(format!(
                    "superseded by {by}"
                ))));
        }
    }

    /// Fire-and-forget backend call with a timeout; failures are logged,
    /// never propagated. Used by teardown paths where local cleanup must
    /// complete regardless.
    fn spawn_best_effort<F>(&self, op: &'static str, operation: F)
    where
        F: Future<Output = Result<(), BackendError>> + Send + 'static,
    {
        let coordinator_id = self.coordinator_id.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(TEARDOWN_TIMEOUT, operation).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "coordinator.actor",
                        coordinator_id = %coordinator_id,
                        op,
                        "Best-effort backend call completed"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "coordinator.actor",
                        coordinator_id = %coordinator_id,
                        op,
                        error = %e,
                        "Best-effort backend call failed"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "coordinator.actor",
                        coordinator_id = %coordinator_id,
                        op,
                        "Best-effort backend call timed out"
                    );
                }
            }
        });
    }

    // ------------------------------------------------------------------
    // Guards and publication
    // ------------------------------------------------------------------

    fn rejected(&self, error: CoordinatorError) -> CoordinatorError {
        self.metrics.record_rejection(error.kind());
        error
    }

    fn providers_ref(&self) -> Result<&ProviderPair, CoordinatorError> {
        if self.providers.is_none() {
            return Err(self.rejected(CoordinatorError::Configuration(
                "provider not configured".to_string(),
            )));
        }
        // Checked above
        self.providers
            .as_ref()
            .ok_or_else(|| CoordinatorError::Internal("provider state desynced".to_string()))
    }

    fn require_session(&self, op: &str) -> Result<(), CoordinatorError> {
        if self.session.is_none() {
            return Err(self.rejected(CoordinatorError::NoActiveSession(format!(
                "{op} requires a login"
            ))));
        }
        Ok(())
    }

    fn require_room(&self, op: &str) -> Result<(), CoordinatorError> {
        self.require_session(op)?;
        let in_room = self
            .session
            .as_ref()
            .is_some_and(|s| s.room_id.is_some());
        if !in_room {
            return Err(self.rejected(CoordinatorError::InvalidState(format!(
                "{op} requires a joined room"
            ))));
        }
        Ok(())
    }

    fn ensure_no_pending(
        &self,
        resource: OpResource,
        op: &'static str,
    ) -> Result<(), CoordinatorError> {
        if self.pending.contains_key(&resource) {
            return Err(self.rejected(CoordinatorError::OperationInProgress(op)));
        }
        Ok(())
    }

    fn set_connection_state(&mut self, next: ConnectionState) {
        if *self.connection_tx.borrow() == next {
            return;
        }
        self.connection_tx.send_replace(next.clone());
        self.broadcast(CoordinatorEvent::ConnectionStateChanged(next));
    }

    fn broadcast(&self, event: CoordinatorEvent) {
        // No subscribers is fine; events are advisory
        let _ = self.events.send(event);
    }

    fn shutdown(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.cancel.cancel();
            let _ = pending
                .respond_to
                .send(Err(CoordinatorError::InvalidState(
                    "coordinator shutting down".to_string(),
                )));
        }
        for (_, task) in self.renewals.drain() {
            task.cancel();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use provider_api::factory::StaticProviderFactory;
    use provider_api::secret::SecretString;
    use provider_api::token_supply::{TokenSupplier, TokenSupplyError};
    use async_trait::async_trait;

    struct NoTokens;

    #[async_trait]
    impl TokenSupplier for NoTokens {
        async fn fresh_token(
            &self,
            _channel: ChannelKind,
        ) -> Result<SecretString, TokenSupplyError> {
            Err(TokenSupplyError("no token source in this test".to_string()))
        }
    }

    fn unconfigured_handle() -> CoordinatorHandle {
        CoordinatorHandle::new(
            CoordinatorConfig::default(),
            Arc::new(StaticProviderFactory::new()),
            Arc::new(NoTokens),
        )
    }

    #[tokio::test]
    async fn test_login_requires_configuration() {
        let handle = unconfigured_handle();

        let result = handle
            .login(UserId::new("u1"), "User One".to_string(), UserRole::Host)
            .await;
        assert!(matches!(result, Err(CoordinatorError::Configuration(_))));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_configure_unregistered_provider_fails() {
        let handle = unconfigured_handle();

        let result = handle
            .configure(
                ProviderKind::new("missing"),
                ProviderCredentials {
                    app_id: "app".to_string(),
                    app_certificate: SecretString::from("cert"),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(CoordinatorError::Backend(BackendError::Unsupported(_)))
        ));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_initial_snapshots_are_empty() {
        let handle = unconfigured_handle();

        assert_eq!(handle.connection_state(), ConnectionState::Disconnected);
        assert!(handle.volume_view().users.is_empty());
        assert!(handle.session().await.unwrap().is_none());
        assert!(handle.capabilities().await.unwrap().is_none());

        let status = handle.status().await.unwrap();
        assert!(!status.configured);
        assert!(!status.logged_in);
        assert!(!status.in_room);
        assert_eq!(status.pending_ops, 0);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_teardown_without_configure_rejected() {
        let handle = unconfigured_handle();

        let result = handle.teardown().await;
        assert!(matches!(result, Err(CoordinatorError::InvalidState(_))));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_cancellation_token() {
        let handle = unconfigured_handle();
        assert!(!handle.is_cancelled());

        handle.cancel();
        assert!(handle.is_cancelled());
    }
}
