//! Scriptable mock provider pair for coordinator testing.
//!
//! [`MockProvider`] bundles a [`MockMediaTransport`] and a [`MockMessaging`]
//! behind a one-kind factory. Both mocks record every call they receive and
//! can be scripted to fail or delay specific operations, and the provider
//! captures
//! the coordinator's event sender so tests can inject [`ProviderEvent`]s as
//! if the vendor SDK raised them.

use provider_api::error::BackendError;
use provider_api::events::ProviderEvent;
use provider_api::factory::{
    ProviderCapabilities, ProviderFactory, ProviderPair, StaticProviderFactory,
};
use provider_api::messaging::Messaging;
use provider_api::transport::MediaTransport;
use provider_api::types::{
    MediaRelayConfig, ProviderCredentials, RoomId, StreamLayout, StreamPushConfig, UserId,
    UserRole,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Call log, failure, and latency script shared by both mock backends.
#[derive(Debug, Default)]
struct MockScript {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, BackendError>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl MockScript {
    /// Record a call, wait out any scripted latency, and return the
    /// scripted failure for `op`, if any.
    ///
    /// The call is logged before the latency elapses, so a test can observe
    /// that an operation is in flight while holding it open.
    async fn record(&self, entry: String, op: &str) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(entry);
        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().unwrap().get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Mock media transport with call recording and failure injection.
///
/// Call log entries are the operation name, with the salient argument
/// appended after a colon where one exists (e.g. `"join_room:room-1"`).
#[derive(Debug, Default)]
pub struct MockMediaTransport {
    script: MockScript,
}

impl MockMediaTransport {
    /// Script `op` to fail with an injected network error.
    pub fn fail(&self, op: &str) {
        self.fail_with(op, BackendError::Network(format!("injected failure in {op}")));
    }

    /// Script `op` to fail with a specific error.
    pub fn fail_with(&self, op: &str, error: BackendError) {
        self.script
            .failures
            .lock()
            .unwrap()
            .insert(op.to_string(), error);
    }

    /// Remove the scripted failure for `op`.
    pub fn succeed(&self, op: &str) {
        self.script.failures.lock().unwrap().remove(op);
    }

    /// Script `op` to take `duration` before completing.
    ///
    /// The call is logged as soon as it starts, so a test can observe an
    /// operation in flight and race a second request against it.
    pub fn delay(&self, op: &str, duration: Duration) {
        self.script
            .delays
            .lock()
            .unwrap()
            .insert(op.to_string(), duration);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.script.calls.lock().unwrap().clone()
    }

    /// How many times `op` was called.
    pub fn call_count(&self, op: &str) -> usize {
        self.script
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == op || c.starts_with(&format!("{op}:")))
            .count()
    }
}

#[async_trait]
impl MediaTransport for MockMediaTransport {
    async fn initialize(&self, _credentials: &ProviderCredentials) -> Result<(), BackendError> {
        self.script.record("initialize".to_string(), "initialize").await
    }

    async fn create_room(&self, room: &RoomId) -> Result<(), BackendError> {
        self.script
            .record(format!("create_room:{room}"), "create_room").await
    }

    async fn join_room(
        &self,
        room: &RoomId,
        _user: &UserId,
        _role: UserRole,
        _token: Option<&str>,
    ) -> Result<(), BackendError> {
        self.script.record(format!("join_room:{room}"), "join_room").await
    }

    async fn leave_room(&self) -> Result<(), BackendError> {
        self.script.record("leave_room".to_string(), "leave_room").await
    }

    async fn switch_role(&self, role: UserRole) -> Result<(), BackendError> {
        self.script
            .record(format!("switch_role:{}", role.as_str()), "switch_role").await
    }

    async fn mute_local_audio(&self, muted: bool) -> Result<(), BackendError> {
        self.script
            .record(format!("mute_local_audio:{muted}"), "mute_local_audio").await
    }

    async fn stop_local_audio_stream(&self) -> Result<(), BackendError> {
        self.script.record(
            "stop_local_audio_stream".to_string(),
            "stop_local_audio_stream",
        ).await
    }

    async fn resume_local_audio_stream(&self) -> Result<(), BackendError> {
        self.script.record(
            "resume_local_audio_stream".to_string(),
            "resume_local_audio_stream",
        ).await
    }

    async fn set_audio_mixing_volume(&self, volume: u8) -> Result<(), BackendError> {
        self.script.record(
            format!("set_audio_mixing_volume:{volume}"),
            "set_audio_mixing_volume",
        ).await
    }

    async fn set_playback_signal_volume(&self, volume: u8) -> Result<(), BackendError> {
        self.script.record(
            format!("set_playback_signal_volume:{volume}"),
            "set_playback_signal_volume",
        ).await
    }

    async fn set_recording_signal_volume(&self, volume: u8) -> Result<(), BackendError> {
        self.script.record(
            format!("set_recording_signal_volume:{volume}"),
            "set_recording_signal_volume",
        ).await
    }

    async fn enable_volume_indicator(&self, interval: Duration) -> Result<(), BackendError> {
        self.script.record(
            format!("enable_volume_indicator:{}", interval.as_millis()),
            "enable_volume_indicator",
        ).await
    }

    async fn disable_volume_indicator(&self) -> Result<(), BackendError> {
        self.script.record(
            "disable_volume_indicator".to_string(),
            "disable_volume_indicator",
        ).await
    }

    async fn start_stream_push(&self, config: &StreamPushConfig) -> Result<(), BackendError> {
        self.script.record(
            format!("start_stream_push:{}", config.push_url),
            "start_stream_push",
        ).await
    }

    async fn stop_stream_push(&self) -> Result<(), BackendError> {
        self.script
            .record("stop_stream_push".to_string(), "stop_stream_push").await
    }

    async fn update_stream_push_layout(&self, layout: &StreamLayout) -> Result<(), BackendError> {
        self.script.record(
            format!("update_stream_push_layout:{}", layout.regions.len()),
            "update_stream_push_layout",
        ).await
    }

    async fn start_media_relay(&self, config: &MediaRelayConfig) -> Result<(), BackendError> {
        self.script.record(
            format!("start_media_relay:{}", config.destinations.len()),
            "start_media_relay",
        ).await
    }

    async fn update_media_relay(&self, config: &MediaRelayConfig) -> Result<(), BackendError> {
        self.script.record(
            format!("update_media_relay:{}", config.destinations.len()),
            "update_media_relay",
        ).await
    }

    async fn pause_media_relay(&self, channel: &str) -> Result<(), BackendError> {
        self.script
            .record(format!("pause_media_relay:{channel}"), "pause_media_relay").await
    }

    async fn resume_media_relay(&self, channel: &str) -> Result<(), BackendError> {
        self.script.record(
            format!("resume_media_relay:{channel}"),
            "resume_media_relay",
        ).await
    }

    async fn stop_media_relay(&self) -> Result<(), BackendError> {
        self.script
            .record("stop_media_relay".to_string(), "stop_media_relay").await
    }

    async fn renew_token(&self, _token: &str) -> Result<(), BackendError> {
        self.script.record("renew_token".to_string(), "renew_token").await
    }
}

/// Mock messaging backend with call recording, failure injection, and a
/// small in-memory attribute/member store.
#[derive(Debug, Default)]
pub struct MockMessaging {
    script: MockScript,
    logged_in: AtomicBool,
    user_attributes: Mutex<HashMap<String, String>>,
    channel_members: Mutex<HashMap<String, Vec<UserId>>>,
}

impl MockMessaging {
    /// Script `op` to fail with an injected network error.
    pub fn fail(&self, op: &str) {
        self.fail_with(op, BackendError::Network(format!("injected failure in {op}")));
    }

    /// Script `op` to fail with a specific error.
    pub fn fail_with(&self, op: &str, error: BackendError) {
        self.script
            .failures
            .lock()
            .unwrap()
            .insert(op.to_string(), error);
    }

    /// Remove the scripted failure for `op`.
    pub fn succeed(&self, op: &str) {
        self.script.failures.lock().unwrap().remove(op);
    }

    /// Script `op` to take `duration` before completing.
    pub fn delay(&self, op: &str, duration: Duration) {
        self.script
            .delays
            .lock()
            .unwrap()
            .insert(op.to_string(), duration);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.script.calls.lock().unwrap().clone()
    }

    /// How many times `op` was called.
    pub fn call_count(&self, op: &str) -> usize {
        self.script
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == op || c.starts_with(&format!("{op}:")))
            .count()
    }

    /// Seed the member list returned for a channel.
    pub fn set_channel_members(&self, channel: &str, members: Vec<UserId>) {
        self.channel_members
            .lock()
            .unwrap()
            .insert(channel.to_string(), members);
    }
}

#[async_trait]
impl Messaging for MockMessaging {
    async fn initialize(&self, _credentials: &ProviderCredentials) -> Result<(), BackendError> {
        self.script.record("initialize".to_string(), "initialize").await
    }

    async fn login(&self, user: &UserId, _token: Option<&str>) -> Result<(), BackendError> {
        self.script.record(format!("login:{user}"), "login").await?;
        self.logged_in.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.script.record("logout".to_string(), "logout").await?;
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    async fn create_channel(&self, channel: &str) -> Result<(), BackendError> {
        self.script
            .record(format!("create_channel:{channel}"), "create_channel").await
    }

    async fn join_channel(&self, channel: &str) -> Result<(), BackendError> {
        self.script
            .record(format!("join_channel:{channel}"), "join_channel").await
    }

    async fn leave_channel(&self, channel: &str) -> Result<(), BackendError> {
        self.script
            .record(format!("leave_channel:{channel}"), "leave_channel").await
    }

    async fn channel_members(&self, channel: &str) -> Result<Vec<UserId>, BackendError> {
        self.script
            .record(format!("channel_members:{channel}"), "channel_members").await?;
        Ok(self
            .channel_members
            .lock()
            .unwrap()
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }

    async fn channel_member_count(&self, channel: &str) -> Result<usize, BackendError> {
        self.script.record(
            format!("channel_member_count:{channel}"),
            "channel_member_count",
        ).await?;
        Ok(self
            .channel_members
            .lock()
            .unwrap()
            .get(channel)
            .map_or(0, Vec::len))
    }

    async fn send_peer_message(&self, to: &UserId, _payload: &str) -> Result<(), BackendError> {
        self.script
            .record(format!("send_peer_message:{to}"), "send_peer_message").await
    }

    async fn send_channel_message(&self, channel: &str, _payload: &str) -> Result<(), BackendError> {
        self.script.record(
            format!("send_channel_message:{channel}"),
            "send_channel_message",
        ).await
    }

    async fn set_user_attributes(
        &self,
        attributes: &HashMap<String, String>,
    ) -> Result<(), BackendError> {
        self.script
            .record("set_user_attributes".to_string(), "set_user_attributes").await?;
        self.user_attributes
            .lock()
            .unwrap()
            .extend(attributes.clone());
        Ok(())
    }

    async fn user_attributes(&self, user: &UserId) -> Result<HashMap<String, String>, BackendError> {
        self.script
            .record(format!("user_attributes:{user}"), "user_attributes").await?;
        Ok(self.user_attributes.lock().unwrap().clone())
    }

    async fn delete_user_attributes(&self, keys: &[String]) -> Result<(), BackendError> {
        self.script.record(
            "delete_user_attributes".to_string(),
            "delete_user_attributes",
        ).await?;
        let mut attributes = self.user_attributes.lock().unwrap();
        for key in keys {
            attributes.remove(key);
        }
        Ok(())
    }

    async fn set_channel_attributes(
        &self,
        channel: &str,
        _attributes: &HashMap<String, String>,
    ) -> Result<(), BackendError> {
        self.script.record(
            format!("set_channel_attributes:{channel}"),
            "set_channel_attributes",
        ).await
    }

    async fn channel_attributes(
        &self,
        channel: &str,
    ) -> Result<HashMap<String, String>, BackendError> {
        self.script.record(
            format!("channel_attributes:{channel}"),
            "channel_attributes",
        ).await?;
        Ok(HashMap::new())
    }

    async fn delete_channel_attributes(
        &self,
        channel: &str,
        _keys: &[String],
    ) -> Result<(), BackendError> {
        self.script.record(
            format!("delete_channel_attributes:{channel}"),
            "delete_channel_attributes",
        ).await
    }

    async fn query_online_status(
        &self,
        users: &[UserId],
    ) -> Result<HashMap<UserId, bool>, BackendError> {
        self.script
            .record("query_online_status".to_string(), "query_online_status").await?;
        Ok(users.iter().map(|u| (u.clone(), true)).collect())
    }

    async fn subscribe_online_status(&self, _users: &[UserId]) -> Result<(), BackendError> {
        self.script.record(
            "subscribe_online_status".to_string(),
            "subscribe_online_status",
        ).await
    }

    async fn renew_token(&self, _token: &str) -> Result<(), BackendError> {
        self.script.record("renew_token".to_string(), "renew_token").await
    }
}

/// A complete scriptable provider: mock pair, capabilities, and a captured
/// event sender for injecting provider events into the coordinator.
pub struct MockProvider {
    /// The media transport mock.
    pub media: Arc<MockMediaTransport>,
    /// The messaging mock.
    pub messaging: Arc<MockMessaging>,
    capabilities: ProviderCapabilities,
    events: Mutex<Option<mpsc::Sender<ProviderEvent>>>,
}

impl MockProvider {
    /// The provider kind this mock registers under.
    pub const KIND: &'static str = "mock";

    /// Create a mock provider supporting every capability.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_capabilities(ProviderCapabilities::all())
    }

    /// Create a mock provider with a specific capability set.
    #[must_use]
    pub fn with_capabilities(capabilities: ProviderCapabilities) -> Arc<Self> {
        Arc::new(Self {
            media: Arc::new(MockMediaTransport::default()),
            messaging: Arc::new(MockMessaging::default()),
            capabilities,
            events: Mutex::new(None),
        })
    }

    /// The kind to pass to `configure`.
    #[must_use]
    pub fn kind() -> provider_api::types::ProviderKind {
        provider_api::types::ProviderKind::new(Self::KIND)
    }

    /// Build a factory with this provider registered under [`Self::KIND`].
    ///
    /// The coordinator's event sender is captured on `create`, making
    /// [`emit`](Self::emit) available once `configure` has been called.
    #[must_use]
    pub fn factory(self: &Arc<Self>) -> Arc<StaticProviderFactory> {
        let provider = Arc::clone(self);
        let mut factory = StaticProviderFactory::new();
        factory.register(Self::kind(), move |events| {
            *provider.events.lock().unwrap() = Some(events);
            ProviderPair {
                media: provider.media.clone(),
                messaging: provider.messaging.clone(),
                capabilities: provider.capabilities,
            }
        });
        Arc::new(factory)
    }

    /// Inject a provider event, as if the vendor SDK raised it.
    ///
    /// # Panics
    ///
    /// Panics if called before the coordinator has configured this provider.
    pub async fn emit(&self, event: ProviderEvent) {
        let sender = self
            .events
            .lock()
            .unwrap()
            .clone()
            .expect("emit called before configure captured the event sender");
        sender.send(event).await.expect("event channel closed");
    }
}
