//! Handoff lifecycle events.

use crate::types::PartitionId;

/// Classification carried by an error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Streaming failed mid-fold (send/receive/encode error other than
    /// timeout); the reason carries the original latched cause.
    FoldError,
    /// Any other failure during the operation: resolution, connect, or the
    /// fold engine call itself breaking.
    Unexpected,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::FoldError => write!(f, "fold_error"),
            FailureKind::Unexpected => write!(f, "unexpected"),
        }
    }
}

/// Events a sender reports to its coordinator.
///
/// At most one event is delivered per transfer. Timeouts and rejections
/// raise no event at all: the coordinator observes those through the typed
/// error return and schedules retries itself.
#[derive(Debug, Clone, PartialEq)]
pub enum HandoffEvent {
    /// The transfer completed and the receiver confirmed the final sync.
    /// Suppressed for repair transfers.
    Complete {
        /// Data module that was transferred.
        module: String,
        /// Source partition.
        src_partition: PartitionId,
        /// Target partition.
        dst_partition: PartitionId,
        /// Items counted by the sender (sent, attempted, or filtered).
        total_sent: u64,
    },

    /// The transfer terminated abnormally.
    Error {
        /// Failure classification.
        kind: FailureKind,
        /// Original cause.
        reason: String,
    },
}

impl HandoffEvent {
    /// Check if this is a completion event.
    pub fn is_complete(&self) -> bool {
        matches!(self, HandoffEvent::Complete { .. })
    }
}

/// Listener for handoff lifecycle events.
pub trait HandoffEventListener: Send + Sync + 'static {
    /// Called when a lifecycle event occurs.
    fn on_event(&self, event: HandoffEvent);
}

/// No-op event listener.
pub struct NoopEventListener;

impl HandoffEventListener for NoopEventListener {
    fn on_event(&self, _event: HandoffEvent) {}
}

/// Event listener that logs events.
pub struct LoggingEventListener;

impl HandoffEventListener for LoggingEventListener {
    fn on_event(&self, event: HandoffEvent) {
        match &event {
            HandoffEvent::Complete {
                module,
                src_partition,
                dst_partition,
                total_sent,
            } => {
                tracing::info!(
                    module,
                    %src_partition,
                    %dst_partition,
                    total_sent,
                    "Handoff complete"
                );
            }
            HandoffEvent::Error { kind, reason } => {
                tracing::error!(%kind, reason, "Handoff error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind() {
        let event = HandoffEvent::Complete {
            module: "memstore".to_string(),
            src_partition: PartitionId::from_u64(1),
            dst_partition: PartitionId::from_u64(1),
            total_sent: 10,
        };
        assert!(event.is_complete());

        let event = HandoffEvent::Error {
            kind: FailureKind::FoldError,
            reason: "broken pipe".to_string(),
        };
        assert!(!event.is_complete());
        assert_eq!(FailureKind::FoldError.to_string(), "fold_error");
    }
}
