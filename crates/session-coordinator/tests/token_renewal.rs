//! Integration tests for proactive token renewal.
//!
//! Uses tokio's test-util time control to drive renewal timers, retry
//! backoff, and exhaustion without real waiting.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use coordinator_test_utils::{
    test_credentials, FailingTokenSupplier, FlakyTokenSupplier, MockProvider, StaticTokenSupplier,
};
use provider_api::events::ProviderEvent;
use provider_api::token_supply::TokenSupplier;
use provider_api::types::{ChannelKind, RoomId, UserId, UserRole};
use session_coordinator::{
    ConnectionState, CoordinatorConfig, CoordinatorEvent, CoordinatorHandle,
};
use std::sync::Arc;
use std::time::Duration;

async fn in_room_with(
    provider: &Arc<MockProvider>,
    supplier: Arc<dyn TokenSupplier>,
) -> CoordinatorHandle {
    let handle = CoordinatorHandle::new(CoordinatorConfig::default(), provider.factory(), supplier);
    handle
        .configure(MockProvider::kind(), test_credentials())
        .await
        .unwrap();
    handle
        .login(UserId::new("alice"), "Alice".to_string(), UserRole::Host)
        .await
        .unwrap();
    handle.join_room(RoomId::new("room-1"), None).await.unwrap();
    handle
}

/// Let spawned tasks and the actor drain their ready work.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_media_renewal_fires_before_expiry() {
    let provider = MockProvider::new();
    let supplier = StaticTokenSupplier::shared("fresh-token");
    let handle = in_room_with(&provider, supplier.clone()).await;
    let mut events = handle.subscribe_events();

    provider
        .emit(ProviderEvent::TokenWillExpire {
            channel: ChannelKind::Media,
            expires_in: Duration::from_secs(60),
        })
        .await;

    // Paused time auto-advances through the renewal delay (60s - 30s lead)
    loop {
        if let CoordinatorEvent::TokenRenewed { channel } = events.recv().await.unwrap() {
            assert_eq!(channel, ChannelKind::Media);
            break;
        }
    }
    assert_eq!(supplier.request_count(), 1);
    assert_eq!(provider.media.call_count("renew_token"), 1);
    assert_eq!(provider.messaging.call_count("renew_token"), 0);

    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_messaging_renewal_targets_messaging_backend() {
    let provider = MockProvider::new();
    let handle = in_room_with(&provider, StaticTokenSupplier::shared("fresh-token")).await;
    let mut events = handle.subscribe_events();

    provider
        .emit(ProviderEvent::TokenWillExpire {
            channel: ChannelKind::Messaging,
            expires_in: Duration::from_secs(45),
        })
        .await;

    loop {
        if let CoordinatorEvent::TokenRenewed { channel } = events.recv().await.unwrap() {
            assert_eq!(channel, ChannelKind::Messaging);
            break;
        }
    }
    assert_eq!(provider.messaging.call_count("renew_token"), 1);
    assert_eq!(provider.media.call_count("renew_token"), 0);

    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_renewal_retries_with_backoff_until_success() {
    let provider = MockProvider::new();
    let supplier = FlakyTokenSupplier::new("fresh-token", 2);
    let handle = in_room_with(&provider, supplier.clone()).await;
    let mut events = handle.subscribe_events();

    provider
        .emit(ProviderEvent::TokenWillExpire {
            channel: ChannelKind::Media,
            expires_in: Duration::from_secs(60),
        })
        .await;

    loop {
        if let CoordinatorEvent::TokenRenewed { .. } = events.recv().await.unwrap() {
            break;
        }
    }
    // Two supply failures, then success on the third attempt
    assert_eq!(supplier.request_count(), 3);
    assert_eq!(provider.media.call_count("renew_token"), 1);

    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_renewal_exhaustion_reports_failure_without_disconnect() {
    let provider = MockProvider::new();
    let supplier = FailingTokenSupplier::shared();
    let handle = in_room_with(&provider, supplier.clone()).await;
    let mut events = handle.subscribe_events();

    provider
        .emit(ProviderEvent::TokenWillExpire {
            channel: ChannelKind::Media,
            expires_in: Duration::from_secs(60),
        })
        .await;

    loop {
        if let CoordinatorEvent::TokenRenewalFailed { channel, attempts } =
            events.recv().await.unwrap()
        {
            assert_eq!(channel, ChannelKind::Media);
            assert_eq!(attempts, 5);
            break;
        }
    }
    assert_eq!(supplier.request_count(), 5);
    assert_eq!(provider.media.call_count("renew_token"), 0);

    // Exhaustion is reported, not acted on; the session stays connected
    // until the backend itself drops it
    assert_eq!(handle.connection_state(), ConnectionState::Connected);
    assert!(handle.status().await.unwrap().in_room);

    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_newer_expiry_replaces_pending_renewal() {
    let provider = MockProvider::new();
    let supplier = StaticTokenSupplier::shared("fresh-token");
    let handle = in_room_with(&provider, supplier.clone()).await;

    provider
        .emit(ProviderEvent::TokenWillExpire {
            channel: ChannelKind::Media,
            expires_in: Duration::from_secs(120),
        })
        .await;
    settle().await;
    provider
        .emit(ProviderEvent::TokenWillExpire {
            channel: ChannelKind::Media,
            expires_in: Duration::from_secs(40),
        })
        .await;
    settle().await;

    // Only the replacement timer (40s - 30s lead) fires
    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(provider.media.call_count("renew_token"), 1);

    // The first schedule was cancelled, so nothing else fires later
    tokio::time::advance(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(provider.media.call_count("renew_token"), 1);
    assert_eq!(supplier.request_count(), 1);

    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_leave_and_logout_cancel_pending_renewals() {
    let provider = MockProvider::new();
    let supplier = StaticTokenSupplier::shared("fresh-token");
    let handle = in_room_with(&provider, supplier.clone()).await;

    provider
        .emit(ProviderEvent::TokenWillExpire {
            channel: ChannelKind::Media,
            expires_in: Duration::from_secs(60),
        })
        .await;
    provider
        .emit(ProviderEvent::TokenWillExpire {
            channel: ChannelKind::Messaging,
            expires_in: Duration::from_secs(60),
        })
        .await;
    settle().await;

    // Leaving the room cancels the media renewal, logout the messaging one
    handle.leave_room().await.unwrap();
    handle.logout().await.unwrap();

    tokio::time::advance(Duration::from_secs(300)).await;
    settle().await;
    assert_eq!(provider.media.call_count("renew_token"), 0);
    assert_eq!(provider.messaging.call_count("renew_token"), 0);
    assert_eq!(supplier.request_count(), 0);

    handle.cancel();
}
