//! Background token renewal.
//!
//! Each channel (media, messaging) gets its own renewal task, spawned when
//! the backend reports that a token will expire. The task sleeps until the
//! configured lead time before expiry, asks the token supplier for a fresh
//! token, and hands it to the backend. Failures retry with exponential
//! backoff up to a bounded attempt count; the terminal outcome is posted
//! back to the coordinator actor, which decides what to publish.
//!
//! Renewal never tears down a session by itself: after exhausting its
//! retries the task reports failure and exits, leaving the session up for
//! the subscriber to deal with.

use crate::config::CoordinatorConfig;
use provider_api::error::BackendError;
use provider_api::messaging::Messaging;
use provider_api::secret::ExposeSecret;
use provider_api::token_supply::TokenSupplier;
use provider_api::transport::MediaTransport;
use provider_api::types::ChannelKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Renewal timing knobs, extracted from the coordinator config so the
/// spawned task carries no unrelated configuration.
#[derive(Debug, Clone, Copy)]
pub struct RenewalSchedule {
    /// Renewal starts this long before the reported expiry.
    pub lead: Duration,
    /// Initial delay between failed attempts.
    pub backoff_base: Duration,
    /// Delay cap between failed attempts.
    pub backoff_cap: Duration,
    /// Attempts before giving up.
    pub max_attempts: u32,
}

impl From<&CoordinatorConfig> for RenewalSchedule {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            lead: config.renewal_lead,
            backoff_base: config.renewal_backoff_base,
            backoff_cap: config.renewal_backoff_cap,
            max_attempts: config.renewal_max_attempts,
        }
    }
}

/// The backend half of a renewal: which channel's `renew_token` to call.
#[derive(Clone)]
pub enum RenewTarget {
    /// Renew the media channel token.
    Media(Arc<dyn MediaTransport>),
    /// Renew the messaging channel token.
    Messaging(Arc<dyn Messaging>),
}

impl RenewTarget {
    /// The channel this target renews.
    #[must_use]
    pub fn channel(&self) -> ChannelKind {
        match self {
            RenewTarget::Media(_) => ChannelKind::Media,
            RenewTarget::Messaging(_) => ChannelKind::Messaging,
        }
    }

    async fn renew(&self, token: &str) -> Result<(), BackendError> {
        match self {
            RenewTarget::Media(media) => media.renew_token(token).await,
            RenewTarget::Messaging(messaging) => messaging.renew_token(token).await,
        }
    }
}

impl std::fmt::Debug for RenewTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenewTarget::Media(_) => f.write_str("RenewTarget::Media"),
            RenewTarget::Messaging(_) => f.write_str("RenewTarget::Messaging"),
        }
    }
}

/// Terminal outcome of a renewal task, posted back to the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// The token was renewed.
    Renewed {
        /// The renewed channel.
        channel: ChannelKind,
    },
    /// All attempts failed; the session is left up.
    Failed {
        /// The channel whose renewal failed.
        channel: ChannelKind,
        /// Attempts made before giving up.
        attempts: u32,
    },
}

/// Handle to a spawned renewal task.
///
/// Dropping the handle does not stop the task; call [`RenewalTask::cancel`]
/// when the channel logs out or a newer expiry warning supersedes this one.
#[derive(Debug)]
pub struct RenewalTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RenewalTask {
    /// Cancel the task. Safe to call more than once; a task that already
    /// posted its outcome ignores the cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Time to wait before the first renewal attempt.
///
/// Zero when the expiry is already inside the lead window.
#[must_use]
pub fn renewal_delay(expires_in: Duration, lead: Duration) -> Duration {
    expires_in.saturating_sub(lead)
}

/// Backoff delay before retrying after `failed_attempts` failures.
///
/// Doubles from the base and saturates at the cap: 2s, 4s, 8s, 16s, 30s
/// with the default schedule.
#[must_use]
pub fn backoff_delay(schedule: &RenewalSchedule, failed_attempts: u32) -> Duration {
    let exponent = failed_attempts.saturating_sub(1).min(16);
    let delay = schedule.backoff_base.saturating_mul(1_u32 << exponent);
    delay.min(schedule.backoff_cap)
}

/// Spawn a renewal task for one channel.
///
/// The task sleeps until `lead` before the reported expiry, then retries
/// supply-and-renew with backoff until it succeeds, exhausts its attempts,
/// or is cancelled. The terminal outcome goes to `outcome_tx`; cancellation
/// posts nothing.
pub fn spawn_renewal(
    schedule: RenewalSchedule,
    target: RenewTarget,
    supplier: Arc<dyn TokenSupplier>,
    expires_in: Duration,
    outcome_tx: mpsc::Sender<RenewalOutcome>,
) -> RenewalTask {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let handle = tokio::spawn(async move {
        let channel = target.channel();
        let delay = renewal_delay(expires_in, schedule.lead);

        debug!(
            target: "coordinator.tokens",
            channel = channel.as_str(),
            delay_secs = delay.as_secs(),
            "Renewal scheduled"
        );

        tokio::select! {
            () = task_cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        let outcome = renewal_loop(&schedule, &target, supplier.as_ref(), &task_cancel).await;
        let Some(outcome) = outcome else {
            return; // cancelled mid-renewal
        };

        // The actor may already be gone during shutdown; nothing to do then.
        let _ = outcome_tx.send(outcome).await;
    });

    RenewalTask { cancel, handle }
}

async fn renewal_loop(
    schedule: &RenewalSchedule,
    target: &RenewTarget,
    supplier: &dyn TokenSupplier,
    cancel: &CancellationToken,
) -> Option<RenewalOutcome> {
    let channel = target.channel();

    for attempt in 1..=schedule.max_attempts {
        let result = async {
            let token = supplier
                .fresh_token(channel)
                .await
                .map_err(|e| e.to_string())?;
            target
                .renew(token.expose_secret())
                .await
                .map_err(|e| e.to_string())
        }
        .await;

        match result {
            Ok(()) => {
                info!(
                    target: "coordinator.tokens",
                    channel = channel.as_str(),
                    attempt,
                    "Token renewed"
                );
                return Some(RenewalOutcome::Renewed { channel });
            }
            Err(error) => {
                if attempt == schedule.max_attempts {
                    warn!(
                        target: "coordinator.tokens",
                        channel = channel.as_str(),
                        attempts = attempt,
                        error = %error,
                        "Token renewal exhausted its attempts"
                    );
                    return Some(RenewalOutcome::Failed {
                        channel,
                        attempts: attempt,
                    });
                }

                let delay = backoff_delay(schedule, attempt);
                warn!(
                    target: "coordinator.tokens",
                    channel = channel.as_str(),
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %error,
                    "Token renewal failed, will retry"
                );

                tokio::select! {
                    () = cancel.cancelled() => return None,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    // Unreachable: the loop returns on the final attempt. max_attempts is
    // validated to be at least 1 at config load.
    None
}
