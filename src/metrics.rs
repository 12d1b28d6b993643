//! Metrics for handoff observability.
//!
//! Prometheus-style counters and gauges kept as process-wide atomics. The
//! timeout counter feeds retry-scheduling dashboards; the coordinator reads
//! the rest when deciding how many concurrent transfers to admit.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicU64::new(0),
        }
    }

    /// Get the counter name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the counter help text.
    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by a specific amount.
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge that can increase or decrease.
#[derive(Debug)]
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    value: AtomicI64,
}

impl Gauge {
    /// Create a new gauge.
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicI64::new(0),
        }
    }

    /// Get the gauge name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the gauge help text.
    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Increment the gauge by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the gauge by 1.
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Set the gauge to a specific value.
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metrics for handoff sender operations.
#[derive(Debug)]
pub struct HandoffMetrics {
    /// Transfers currently streaming.
    pub senders_active: Gauge,
    /// Total transfers started.
    pub sends_started: Counter,
    /// Total transfers completed successfully.
    pub sends_completed: Counter,
    /// Total transfers that failed with a non-timeout error.
    pub sends_failed: Counter,
    /// Total transfers rejected by the receiver's concurrency cap.
    pub sends_rejected: Counter,
    /// Total receive timeouts, across handshake, keep-alive and final sync.
    pub timeouts: Counter,
    /// Total bytes written to handoff connections.
    pub bytes_sent: Counter,
    /// Total objects written to handoff connections.
    pub objects_sent: Counter,
}

impl HandoffMetrics {
    /// Create new handoff metrics.
    pub fn new() -> Self {
        Self {
            senders_active: Gauge::new("handoff_senders_active", "Transfers currently streaming"),
            sends_started: Counter::new("handoff_sends_started", "Total transfers started"),
            sends_completed: Counter::new("handoff_sends_completed", "Total transfers completed"),
            sends_failed: Counter::new("handoff_sends_failed", "Total transfers failed"),
            sends_rejected: Counter::new("handoff_sends_rejected", "Total transfers rejected"),
            timeouts: Counter::new("handoff_timeouts", "Total receive timeouts"),
            bytes_sent: Counter::new("handoff_bytes_sent", "Total bytes transferred"),
            objects_sent: Counter::new("handoff_objects_sent", "Total objects transferred"),
        }
    }

    /// Record a transfer start.
    pub fn record_start(&self) {
        self.sends_started.inc();
        self.senders_active.inc();
    }

    /// Record a successful completion.
    pub fn record_complete(&self) {
        self.sends_completed.inc();
        self.senders_active.dec();
    }

    /// Record a timeout termination.
    pub fn record_timeout(&self) {
        self.timeouts.inc();
        self.senders_active.dec();
    }

    /// Record a receiver-side rejection.
    pub fn record_rejected(&self) {
        self.sends_rejected.inc();
        self.senders_active.dec();
    }

    /// Record a failed transfer.
    pub fn record_failed(&self) {
        self.sends_failed.inc();
        self.senders_active.dec();
    }

    /// Get a point-in-time snapshot.
    pub fn snapshot(&self) -> HandoffMetricsSnapshot {
        HandoffMetricsSnapshot {
            senders_active: self.senders_active.get(),
            sends_started: self.sends_started.get(),
            sends_completed: self.sends_completed.get(),
            sends_failed: self.sends_failed.get(),
            sends_rejected: self.sends_rejected.get(),
            timeouts: self.timeouts.get(),
            bytes_sent: self.bytes_sent.get(),
            objects_sent: self.objects_sent.get(),
        }
    }
}

impl Default for HandoffMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`HandoffMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffMetricsSnapshot {
    pub senders_active: i64,
    pub sends_started: u64,
    pub sends_completed: u64,
    pub sends_failed: u64,
    pub sends_rejected: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub objects_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let c = Counter::new("test", "test counter");
        assert_eq!(c.get(), 0);
        c.inc();
        c.inc_by(4);
        assert_eq!(c.get(), 5);
        assert_eq!(c.name(), "test");
    }

    #[test]
    fn test_gauge() {
        let g = Gauge::new("test", "test gauge");
        g.inc();
        g.inc();
        g.dec();
        assert_eq!(g.get(), 1);
        g.set(-3);
        assert_eq!(g.get(), -3);
    }

    #[test]
    fn test_handoff_metrics_lifecycle() {
        let m = HandoffMetrics::new();
        m.record_start();
        assert_eq!(m.senders_active.get(), 1);

        m.record_timeout();
        let snap = m.snapshot();
        assert_eq!(snap.senders_active, 0);
        assert_eq!(snap.sends_started, 1);
        assert_eq!(snap.timeouts, 1);
        assert_eq!(snap.sends_completed, 0);
    }
}
