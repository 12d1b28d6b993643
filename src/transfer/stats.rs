//! Progress counters and periodic status reporting.
//!
//! Reporting is a pure function of the counters and the clock, checked
//! inline after every counter update. Cadence is therefore approximate
//! (bounded above by the gap between consecutive items) but never blocks
//! the send loop on a timer or a separate task.

use crate::types::{NodeName, PartitionId};
use std::time::Duration;
use tokio::time::Instant;

/// Identity of a transfer, used to key status reports and log terminal
/// outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferIdentity {
    /// Data module being transferred.
    pub module: String,
    /// Target node.
    pub target: NodeName,
    /// Source partition.
    pub src_partition: PartitionId,
    /// Target partition.
    pub dst_partition: PartitionId,
}

impl std::fmt::Display for TransferIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} -> {} on {}",
            self.module, self.src_partition, self.dst_partition, self.target
        )
    }
}

/// One progress report. Immutable once constructed; counters are cumulative
/// across the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Bytes written to the connection so far.
    pub bytes: u64,
    /// Objects written to the connection so far.
    pub objects: u64,
    /// When the counters were last updated.
    pub timestamp: Instant,
}

/// Sink for progress snapshots. Fire-and-forget: implementations must not
/// block the send loop.
pub trait StatusSink: Send + Sync {
    /// Deliver one snapshot.
    fn report(&self, identity: &TransferIdentity, snapshot: ProgressSnapshot);
}

/// Sink that drops every report.
pub struct NoopStatusSink;

impl StatusSink for NoopStatusSink {
    fn report(&self, _identity: &TransferIdentity, _snapshot: ProgressSnapshot) {}
}

/// Sink that logs reports.
pub struct LoggingStatusSink;

impl StatusSink for LoggingStatusSink {
    fn report(&self, identity: &TransferIdentity, snapshot: ProgressSnapshot) {
        tracing::debug!(
            transfer = %identity,
            bytes = snapshot.bytes,
            objects = snapshot.objects,
            "Handoff progress"
        );
    }
}

/// Byte/object counters with the reporting deadline.
#[derive(Debug, Clone)]
pub struct TransferStats {
    bytes: u64,
    objects: u64,
    last_update: Instant,
    interval: Duration,
    interval_end: Instant,
}

impl TransferStats {
    /// Fresh counters; the first report is due one interval from now.
    pub fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            bytes: 0,
            objects: 0,
            last_update: now,
            interval,
            interval_end: now + interval,
        }
    }

    /// Bytes written so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Objects written so far.
    pub fn objects(&self) -> u64 {
        self.objects
    }

    /// Record wire bytes written.
    pub fn record_bytes(&mut self, n: u64) {
        self.bytes += n;
        self.last_update = Instant::now();
    }

    /// Record one object written, with its wire size.
    pub fn record_object(&mut self, wire_bytes: u64) {
        self.objects += 1;
        self.record_bytes(wire_bytes);
    }

    /// Emit a snapshot if the reporting deadline has passed, then push the
    /// deadline one interval out.
    pub fn maybe_report(&mut self, sink: &dyn StatusSink, identity: &TransferIdentity) {
        let now = Instant::now();
        if now < self.interval_end {
            return;
        }
        sink.report(
            identity,
            ProgressSnapshot {
                bytes: self.bytes,
                objects: self.objects,
                timestamp: self.last_update,
            },
        );
        self.interval_end = now + self.interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    fn identity() -> TransferIdentity {
        TransferIdentity {
            module: "memstore".to_string(),
            target: NodeName::new("store@127.0.0.1"),
            src_partition: PartitionId::from_u64(1),
            dst_partition: PartitionId::from_u64(1),
        }
    }

    #[test]
    fn test_counters_accumulate() {
        let mut stats = TransferStats::new(Duration::from_secs(2));
        stats.record_object(100);
        stats.record_object(50);
        stats.record_bytes(5);

        assert_eq!(stats.objects(), 2);
        assert_eq!(stats.bytes(), 155);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_cadence() {
        let sink = RecordingSink::new();
        let identity = identity();
        let mut stats = TransferStats::new(Duration::from_secs(2));

        // One item every 100ms for 10 simulated seconds.
        for _ in 0..100 {
            stats.record_object(100);
            stats.maybe_report(&sink, &identity);
            tokio::time::advance(Duration::from_millis(100)).await;
        }

        let snapshots = sink.snapshots();
        assert_eq!(snapshots.len(), 4);
        for pair in snapshots.windows(2) {
            assert!(pair[1].timestamp - pair[0].timestamp >= Duration::from_secs(2));
            assert!(pair[1].bytes >= pair[0].bytes);
            assert!(pair[1].objects >= pair[0].objects);
        }

        // Counters are cumulative, not per-interval.
        assert_eq!(snapshots.last().unwrap().objects, 81);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_report_before_deadline() {
        let sink = RecordingSink::new();
        let identity = identity();
        let mut stats = TransferStats::new(Duration::from_secs(2));

        stats.record_object(10);
        stats.maybe_report(&sink, &identity);
        assert!(sink.snapshots().is_empty());
    }
}
