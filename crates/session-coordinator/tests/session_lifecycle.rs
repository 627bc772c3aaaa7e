//! Integration tests for the session lifecycle.
//!
//! Drives a coordinator against the scriptable mock provider through the
//! configure/login/join/leave/logout/teardown flows and verifies state
//! guards, best-effort teardown, and connection state publication.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use coordinator_test_utils::{test_credentials, MockProvider, StaticTokenSupplier};
use provider_api::error::BackendError;
use provider_api::events::ProviderEvent;
use provider_api::types::{ChannelKind, ConnectionChange, RoomId, UserId, UserRole};
use session_coordinator::{
    ConnectionState, CoordinatorConfig, CoordinatorError, CoordinatorHandle,
};
use std::sync::Arc;
use std::time::Duration;

fn coordinator(provider: &Arc<MockProvider>) -> CoordinatorHandle {
    CoordinatorHandle::new(
        CoordinatorConfig::default(),
        provider.factory(),
        StaticTokenSupplier::shared("fresh-token"),
    )
}

async fn configured(provider: &Arc<MockProvider>) -> CoordinatorHandle {
    let handle = coordinator(provider);
    handle
        .configure(MockProvider::kind(), test_credentials())
        .await
        .unwrap();
    handle
}

async fn logged_in(provider: &Arc<MockProvider>) -> CoordinatorHandle {
    let handle = configured(provider).await;
    handle
        .login(UserId::new("alice"), "Alice".to_string(), UserRole::Host)
        .await
        .unwrap();
    handle
}

async fn in_room(provider: &Arc<MockProvider>) -> CoordinatorHandle {
    let handle = logged_in(provider).await;
    handle
        .join_room(RoomId::new("room-1"), Some("room-token".to_string()))
        .await
        .unwrap();
    handle
}

#[tokio::test]
async fn test_full_lifecycle_happy_path() {
    let provider = MockProvider::new();
    let handle = in_room(&provider).await;

    let status = handle.status().await.unwrap();
    assert!(status.configured);
    assert!(status.logged_in);
    assert!(status.in_room);
    assert_eq!(handle.connection_state(), ConnectionState::Connected);

    let session = handle.session().await.unwrap().unwrap();
    assert_eq!(session.user_id, UserId::new("alice"));
    assert_eq!(session.room_id, Some(RoomId::new("room-1")));
    assert_eq!(session.role, UserRole::Host);

    // Both halves of the pair were initialized, then login and join hit
    // the right backends
    assert_eq!(provider.media.call_count("initialize"), 1);
    assert_eq!(provider.messaging.call_count("initialize"), 1);
    assert_eq!(provider.messaging.call_count("login"), 1);
    assert_eq!(provider.media.call_count("join_room"), 1);

    handle.leave_room().await.unwrap();
    let status = handle.status().await.unwrap();
    assert!(status.logged_in);
    assert!(!status.in_room);
    assert_eq!(handle.connection_state(), ConnectionState::Disconnected);

    handle.logout().await.unwrap();
    assert!(handle.session().await.unwrap().is_none());

    handle.cancel();
}

#[tokio::test]
async fn test_configure_twice_requires_teardown() {
    let provider = MockProvider::new();
    let handle = configured(&provider).await;

    let result = handle
        .configure(MockProvider::kind(), test_credentials())
        .await;
    assert!(matches!(result, Err(CoordinatorError::Configuration(_))));

    // After teardown a fresh configure is accepted again
    handle.teardown().await.unwrap();
    handle
        .configure(MockProvider::kind(), test_credentials())
        .await
        .unwrap();

    handle.cancel();
}

#[tokio::test]
async fn test_configure_failure_leaves_unconfigured() {
    let provider = MockProvider::new();
    provider.media.fail("initialize");
    let handle = coordinator(&provider);

    let result = handle
        .configure(MockProvider::kind(), test_credentials())
        .await;
    assert!(matches!(result, Err(CoordinatorError::Backend(_))));
    assert!(!handle.status().await.unwrap().configured);

    // Retry succeeds once the backend recovers
    provider.media.succeed("initialize");
    handle
        .configure(MockProvider::kind(), test_credentials())
        .await
        .unwrap();

    handle.cancel();
}

#[tokio::test]
async fn test_join_requires_login() {
    let provider = MockProvider::new();
    let handle = configured(&provider).await;

    let result = handle.join_room(RoomId::new("room-1"), None).await;
    assert!(matches!(result, Err(CoordinatorError::NoActiveSession(_))));

    handle.cancel();
}

#[tokio::test]
async fn test_join_while_in_room_rejected() {
    let provider = MockProvider::new();
    let handle = in_room(&provider).await;

    let result = handle.join_room(RoomId::new("room-2"), None).await;
    assert!(matches!(result, Err(CoordinatorError::InvalidState(_))));
    assert_eq!(
        handle.session().await.unwrap().unwrap().room_id,
        Some(RoomId::new("room-1"))
    );

    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_join_rejected_while_first_in_flight() {
    let provider = MockProvider::new();
    let handle = logged_in(&provider).await;
    provider.media.delay("join_room", Duration::from_secs(5));

    let first = tokio::spawn({
        let handle = handle.clone();
        async move { handle.join_room(RoomId::new("room-1"), None).await }
    });
    // Wait until the first join has reached the backend and is held open
    while provider.media.call_count("join_room") == 0 {
        tokio::task::yield_now().await;
    }

    let second = handle.join_room(RoomId::new("room-2"), None).await;
    assert!(matches!(
        second,
        Err(CoordinatorError::OperationInProgress(_))
    ));

    // The first join is unaffected and completes once the latency elapses
    first.await.unwrap().unwrap();
    let session = handle.session().await.unwrap().unwrap();
    assert_eq!(session.room_id, Some(RoomId::new("room-1")));
    assert_eq!(provider.media.call_count("join_room"), 1);

    handle.cancel();
}

#[tokio::test]
async fn test_join_failure_sets_failed_state_and_allows_retry() {
    let provider = MockProvider::new();
    let handle = logged_in(&provider).await;

    provider.media.fail("join_room");
    let result = handle.join_room(RoomId::new("room-1"), None).await;
    assert!(matches!(result, Err(CoordinatorError::Backend(_))));
    assert!(matches!(
        handle.connection_state(),
        ConnectionState::Failed(_)
    ));

    // A failed join keeps the login; retry works without logging in again
    assert!(handle.status().await.unwrap().logged_in);
    provider.media.succeed("join_room");
    handle.join_room(RoomId::new("room-1"), None).await.unwrap();
    assert_eq!(handle.connection_state(), ConnectionState::Connected);

    handle.cancel();
}

#[tokio::test]
async fn test_leave_room_without_room_rejected() {
    let provider = MockProvider::new();
    let handle = logged_in(&provider).await;

    let result = handle.leave_room().await;
    assert!(matches!(result, Err(CoordinatorError::NoActiveSession(_))));

    handle.cancel();
}

#[tokio::test]
async fn test_logout_is_best_effort_on_backend_failure() {
    let provider = MockProvider::new();
    let handle = in_room(&provider).await;

    provider.messaging.fail("logout");
    provider.media.fail("leave_room");

    // Local cleanup completes even though both backend calls fail
    handle.logout().await.unwrap();
    assert!(handle.session().await.unwrap().is_none());
    assert_eq!(handle.connection_state(), ConnectionState::Disconnected);

    handle.cancel();
}

#[tokio::test]
async fn test_teardown_from_full_session() {
    let provider = MockProvider::new();
    let handle = in_room(&provider).await;

    handle.teardown().await.unwrap();

    let status = handle.status().await.unwrap();
    assert!(!status.configured);
    assert!(!status.logged_in);
    assert!(!status.in_room);
    assert!(handle.capabilities().await.unwrap().is_none());

    handle.cancel();
}

#[tokio::test]
async fn test_connection_state_follows_backend_events() {
    let provider = MockProvider::new();
    let handle = in_room(&provider).await;
    let mut rx = handle.watch_connection_state();

    provider
        .emit(ProviderEvent::ConnectionChanged {
            channel: ChannelKind::Media,
            change: ConnectionChange::Reconnecting,
        })
        .await;
    rx.wait_for(|s| *s == ConnectionState::Reconnecting)
        .await
        .unwrap();

    provider
        .emit(ProviderEvent::ConnectionChanged {
            channel: ChannelKind::Media,
            change: ConnectionChange::Connected,
        })
        .await;
    rx.wait_for(|s| *s == ConnectionState::Connected)
        .await
        .unwrap();

    handle.cancel();
}

#[tokio::test]
async fn test_switch_role_updates_session_and_audio_stream() {
    let provider = MockProvider::new();
    let handle = in_room(&provider).await;

    handle.switch_role(UserRole::Audience).await.unwrap();

    let session = handle.session().await.unwrap().unwrap();
    assert_eq!(session.role, UserRole::Audience);
    // Audience cannot publish, so the local stream was stopped
    assert!(!handle.audio_settings().await.unwrap().local_audio_stream_active);
    assert_eq!(provider.media.call_count("stop_local_audio_stream"), 1);

    handle.switch_role(UserRole::Host).await.unwrap();
    assert!(handle.audio_settings().await.unwrap().local_audio_stream_active);
    assert_eq!(provider.media.call_count("resume_local_audio_stream"), 1);

    handle.cancel();
}

#[tokio::test]
async fn test_audio_volume_clamped_before_backend() {
    let provider = MockProvider::new();
    let handle = configured(&provider).await;

    handle.set_audio_mixing_volume(250).await.unwrap();
    assert_eq!(handle.audio_settings().await.unwrap().audio_mixing_volume, 100);
    assert!(provider
        .media
        .calls()
        .contains(&"set_audio_mixing_volume:100".to_string()));

    handle.set_playback_signal_volume(-20).await.unwrap();
    assert_eq!(
        handle.audio_settings().await.unwrap().playback_signal_volume,
        0
    );

    handle.cancel();
}

#[tokio::test]
async fn test_audio_setting_unchanged_on_backend_failure() {
    let provider = MockProvider::new();
    let handle = configured(&provider).await;

    provider.media.fail("mute_local_audio");
    let result = handle.set_microphone_muted(true).await;
    assert!(matches!(
        result,
        Err(CoordinatorError::Backend(BackendError::Network(_)))
    ));
    // Backend-first write: the local snapshot only moves on success
    assert!(!handle.audio_settings().await.unwrap().microphone_muted);

    provider.media.succeed("mute_local_audio");
    handle.set_microphone_muted(true).await.unwrap();
    assert!(handle.audio_settings().await.unwrap().microphone_muted);

    handle.cancel();
}

#[tokio::test]
async fn test_restore_audio_settings_is_local_only() {
    let provider = MockProvider::new();
    let handle = configured(&provider).await;

    let mut snapshot = handle.audio_settings().await.unwrap();
    snapshot.microphone_muted = true;
    snapshot.audio_mixing_volume = 40;

    let media_calls_before = provider.media.calls().len();
    handle.restore_audio_settings(snapshot.clone()).await.unwrap();

    let restored = handle.audio_settings().await.unwrap();
    assert!(restored.microphone_muted);
    assert_eq!(restored.audio_mixing_volume, 40);
    // No backend traffic for a restore
    assert_eq!(provider.media.calls().len(), media_calls_before);

    handle.cancel();
}

#[tokio::test]
async fn test_messaging_passthrough_requires_login() {
    let provider = MockProvider::new();
    let handle = configured(&provider).await;

    let result = handle
        .send_peer_message(UserId::new("bob"), "hi".to_string())
        .await;
    assert!(matches!(result, Err(CoordinatorError::NoActiveSession(_))));

    handle.cancel();
}

#[tokio::test]
async fn test_messaging_passthroughs_reach_backend() {
    let provider = MockProvider::new();
    let handle = logged_in(&provider).await;

    handle.join_channel("lobby".to_string()).await.unwrap();
    handle
        .send_channel_message("lobby".to_string(), "hello".to_string())
        .await
        .unwrap();
    handle
        .send_peer_message(UserId::new("bob"), "hi bob".to_string())
        .await
        .unwrap();
    handle.leave_channel("lobby".to_string()).await.unwrap();

    let calls = provider.messaging.calls();
    assert!(calls.contains(&"join_channel:lobby".to_string()));
    assert!(calls.contains(&"send_channel_message:lobby".to_string()));
    assert!(calls.contains(&"send_peer_message:bob".to_string()));
    assert!(calls.contains(&"leave_channel:lobby".to_string()));

    handle.cancel();
}

#[tokio::test]
async fn test_user_attributes_round_trip() {
    let provider = MockProvider::new();
    let handle = logged_in(&provider).await;

    let mut attributes = std::collections::HashMap::new();
    attributes.insert("display_name".to_string(), "Alice".to_string());
    handle.set_user_attributes(attributes).await.unwrap();

    let back = handle.user_attributes(UserId::new("alice")).await.unwrap();
    assert_eq!(back.get("display_name"), Some(&"Alice".to_string()));

    handle.cancel();
}

#[tokio::test]
async fn test_peer_message_events_broadcast() {
    let provider = MockProvider::new();
    let handle = logged_in(&provider).await;
    let mut events = handle.subscribe_events();

    provider
        .emit(ProviderEvent::PeerMessage {
            from: UserId::new("bob"),
            payload: "ping".to_string(),
        })
        .await;

    loop {
        if let session_coordinator::CoordinatorEvent::PeerMessageReceived { from, payload } =
            events.recv().await.unwrap()
        {
            assert_eq!(from, UserId::new("bob"));
            assert_eq!(payload, "ping");
            break;
        }
    }

    handle.cancel();
}
