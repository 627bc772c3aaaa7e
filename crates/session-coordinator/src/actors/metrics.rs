//! Coordinator metrics and mailbox monitoring.
//!
//! Mailbox depth is tracked with normal/warning thresholds:
//!
//! | Normal | Warning | Critical |
//! |--------|---------|----------|
//! | < 50   | 50-200  | > 200    |
//!
//! Counters are kept as atomics for lock-free reads from health checks and
//! are also emitted through the `metrics` facade with the `coordinator_`
//! prefix, so any installed recorder picks them up.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth below this is normal.
pub const MAILBOX_NORMAL: usize = 50;

/// Mailbox depth above this is critical.
pub const MAILBOX_WARNING: usize = 200;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// Below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Mailbox monitor for tracking queue depth.
#[derive(Debug)]
pub struct MailboxMonitor {
    /// Coordinator instance id, for log correlation.
    coordinator_id: String,
    /// Current mailbox depth.
    depth: AtomicUsize,
    /// Peak mailbox depth since last reset.
    peak_depth: AtomicUsize,
    /// Total messages processed.
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a new mailbox monitor.
    #[must_use]
    pub fn new(coordinator_id: impl Into<String>) -> Self {
        Self {
            coordinator_id: coordinator_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message being picked up for processing.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;

        let mut current_peak = self.peak_depth.load(Ordering::Relaxed);
        while new_depth > current_peak {
            match self.peak_depth.compare_exchange_weak(
                current_peak,
                new_depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }

        metrics::gauge!("coordinator_mailbox_depth").set(new_depth as f64);

        let level = level_for_depth(new_depth);
        if level == MailboxLevel::Critical {
            warn!(
                target: "coordinator.mailbox",
                coordinator_id = %self.coordinator_id,
                depth = new_depth,
                threshold = MAILBOX_WARNING,
                "Mailbox depth critical"
            );
        } else if level == MailboxLevel::Warning && new_depth == MAILBOX_NORMAL {
            // Log once when crossing the warning threshold
            debug!(
                target: "coordinator.mailbox",
                coordinator_id = %self.coordinator_id,
                depth = new_depth,
                "Mailbox depth elevated"
            );
        }
    }

    /// Record a message being processed.
    pub fn record_dequeue(&self) {
        self.depth.fetch_sub(1, Ordering::Relaxed);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current mailbox depth.
    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Get the peak mailbox depth.
    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    /// Get total messages processed.
    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    /// Get the current mailbox level.
    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        level_for_depth(self.current_depth())
    }

    /// Reset peak depth counter to the current depth.
    pub fn reset_peak(&self) {
        self.peak_depth
            .store(self.current_depth(), Ordering::Relaxed);
    }
}

fn level_for_depth(depth: usize) -> MailboxLevel {
    if depth > MAILBOX_WARNING {
        MailboxLevel::Critical
    } else if depth > MAILBOX_NORMAL {
        MailboxLevel::Warning
    } else {
        MailboxLevel::Normal
    }
}

/// Aggregated coordinator counters, shared between the actor (writes) and
/// health checks (reads).
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    /// Operations accepted and executed (including ones that later failed
    /// at the backend).
    pub operations: AtomicU64,
    /// Operations rejected up front (wrong state, operation in progress).
    pub operations_rejected: AtomicU64,
    /// Provider events consumed.
    pub provider_events: AtomicU64,
    /// Volume detection ticks processed.
    pub volume_ticks: AtomicU64,
    /// Successful token renewals.
    pub token_renewals: AtomicU64,
    /// Token renewals that exhausted their attempts.
    pub token_renewal_failures: AtomicU64,
}

impl CoordinatorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record an accepted operation.
    pub fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("coordinator_operations_total").increment(1);
    }

    /// Record an operation rejected before reaching the backend.
    pub fn record_rejection(&self, reason: &'static str) {
        self.operations_rejected.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("coordinator_operations_rejected_total", "reason" => reason)
            .increment(1);
    }

    /// Record a consumed provider event.
    pub fn record_provider_event(&self, event: &'static str) {
        self.provider_events.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("coordinator_provider_events_total", "event" => event).increment(1);
    }

    /// Record a processed volume tick.
    pub fn record_volume_tick(&self) {
        self.volume_ticks.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("coordinator_volume_ticks_total").increment(1);
    }

    /// Record a successful token renewal.
    pub fn record_renewal(&self, channel: &'static str) {
        self.token_renewals.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("coordinator_token_renewals_total", "channel" => channel).increment(1);
    }

    /// Record an exhausted token renewal.
    pub fn record_renewal_failure(&self, channel: &'static str) {
        self.token_renewal_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("coordinator_token_renewal_failures_total", "channel" => channel)
            .increment(1);
    }

    /// Get accepted operation count.
    #[must_use]
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    /// Get rejected operation count.
    #[must_use]
    pub fn rejection_count(&self) -> u64 {
        self.operations_rejected.load(Ordering::Relaxed)
    }

    /// Get consumed provider event count.
    #[must_use]
    pub fn provider_event_count(&self) -> u64 {
        self.provider_events.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_monitor_enqueue_dequeue() {
        let monitor = MailboxMonitor::new("coord-123");

        assert_eq!(monitor.current_depth(), 0);

        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 1);
        assert_eq!(monitor.peak_depth(), 1);

        monitor.record_enqueue();
        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 3);
        assert_eq!(monitor.peak_depth(), 3);

        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 2);
        assert_eq!(monitor.peak_depth(), 3); // Peak stays at 3
        assert_eq!(monitor.messages_processed(), 1);
    }

    #[test]
    fn test_mailbox_monitor_levels() {
        let monitor = MailboxMonitor::new("coord-123");

        assert_eq!(monitor.current_level(), MailboxLevel::Normal);

        for _ in 0..75 {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Warning);

        for _ in 0..150 {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Critical);
    }

    #[test]
    fn test_mailbox_monitor_reset_peak() {
        let monitor = MailboxMonitor::new("coord-123");

        for _ in 0..10 {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.peak_depth(), 10);

        for _ in 0..5 {
            monitor.record_dequeue();
        }
        assert_eq!(monitor.peak_depth(), 10); // Still 10
        assert_eq!(monitor.current_depth(), 5);

        monitor.reset_peak();
        assert_eq!(monitor.peak_depth(), 5); // Reset to current
    }

    #[test]
    fn test_coordinator_metrics_counters() {
        let metrics = CoordinatorMetrics::new();

        assert_eq!(metrics.operation_count(), 0);

        metrics.record_operation();
        metrics.record_operation();
        assert_eq!(metrics.operation_count(), 2);

        metrics.record_rejection("operation_in_progress");
        assert_eq!(metrics.rejection_count(), 1);

        metrics.record_provider_event("volume_report");
        metrics.record_provider_event("token_will_expire");
        assert_eq!(metrics.provider_event_count(), 2);

        metrics.record_renewal("media");
        assert_eq!(metrics.token_renewals.load(Ordering::Relaxed), 1);

        metrics.record_renewal_failure("messaging");
        assert_eq!(metrics.token_renewal_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_mailbox_level_equality() {
        assert_eq!(MailboxLevel::Normal, MailboxLevel::Normal);
        assert_ne!(MailboxLevel::Normal, MailboxLevel::Warning);
        assert_ne!(MailboxLevel::Warning, MailboxLevel::Critical);
    }
}
