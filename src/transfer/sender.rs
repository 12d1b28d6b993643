//! Handoff sender protocol engine.
//!
//! One sender performs one transfer attempt:
//!
//! ```text
//! Connecting ──► Handshaking ──► Streaming ──► FinalSyncing
//!                                                   │
//!                   ┌──────────────┬────────────────┼───────────┐
//!                   ▼              ▼                ▼           ▼
//!               Completed      Rejected         TimedOut     Failed
//! ```
//!
//! Terminal states are mutually exclusive. Nothing is retried internally;
//! a failed transfer is reported upward and re-attempting is the
//! coordinator's decision. The outcome travels on two channels at once:
//! the typed return value and the at-most-once coordinator event.

use crate::cluster::{
    FailureKind, HandoffEvent, HandoffEventListener, ListenerResolver, NoopEventListener,
};
use crate::config::HandoffConfig;
use crate::error::{Error, NetworkError, Result};
use crate::metrics::HandoffMetrics;
use crate::network::transport::{TcpTransport, Transport};
use crate::network::wire;
use crate::transfer::fold::{ItemVisitor, PartitionStore};
use crate::transfer::module::{accept_all, DataModule, KeyFilter};
use crate::transfer::state::{ErrorStatus, FailureReason, TransferState};
use crate::transfer::stats::{NoopStatusSink, StatusSink, TransferIdentity, TransferStats};
use crate::types::{NodeName, PartitionId, TransferKind};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Caller input describing one transfer. Immutable for the transfer's
/// lifetime.
#[derive(Clone)]
pub struct TransferRequest {
    /// Node owning the receiving end.
    pub target: NodeName,
    /// Kind of transfer; only affects completion signaling.
    pub kind: TransferKind,
    /// Partition being read on this node.
    pub src_partition: PartitionId,
    /// Partition being written on the target node.
    pub dst_partition: PartitionId,
    /// Optional key filter; `None` accepts everything.
    pub filter: Option<KeyFilter>,
}

impl TransferRequest {
    /// Create an ownership-transfer request without a filter.
    pub fn new(
        target: NodeName,
        src_partition: impl Into<PartitionId>,
        dst_partition: impl Into<PartitionId>,
    ) -> Self {
        Self {
            target,
            kind: TransferKind::Ownership,
            src_partition: src_partition.into(),
            dst_partition: dst_partition.into(),
            filter: None,
        }
    }

    /// Set the transfer kind.
    pub fn with_kind(mut self, kind: TransferKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the key filter.
    pub fn with_filter(mut self, filter: KeyFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl fmt::Debug for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRequest")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("src_partition", &self.src_partition)
            .field("dst_partition", &self.dst_partition)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// Summary of a completed transfer.
#[derive(Debug, Clone)]
pub struct HandoffSummary {
    /// Id of this transfer attempt.
    pub transfer_id: Uuid,
    /// Data module that was transferred.
    pub module: String,
    /// Target node.
    pub target: NodeName,
    /// Source partition.
    pub src_partition: PartitionId,
    /// Target partition.
    pub dst_partition: PartitionId,
    /// Kind of transfer.
    pub kind: TransferKind,
    /// Items counted: transmitted, attempted, or filtered out.
    pub total_sent: u64,
    /// Bytes written to the connection.
    pub bytes_sent: u64,
    /// Objects written to the connection.
    pub objects_sent: u64,
    /// Wall-clock time from fold start to the final-sync acknowledgment.
    pub duration: Duration,
}

/// The sending side of one partition handoff.
///
/// A sender runs as one independent task per transfer and owns its
/// connection and accumulator exclusively.
pub struct HandoffSender {
    request: TransferRequest,
    config: HandoffConfig,
    resolver: Arc<dyn ListenerResolver>,
    store: Arc<dyn PartitionStore>,
    module: Arc<dyn DataModule>,
    sink: Arc<dyn StatusSink>,
    listener: Arc<dyn HandoffEventListener>,
    metrics: Arc<HandoffMetrics>,
    transfer_id: Uuid,
}

impl HandoffSender {
    /// Create a sender for one transfer.
    pub fn new(
        request: TransferRequest,
        config: HandoffConfig,
        resolver: Arc<dyn ListenerResolver>,
        store: Arc<dyn PartitionStore>,
        module: Arc<dyn DataModule>,
    ) -> Self {
        Self {
            request,
            config,
            resolver,
            store,
            module,
            sink: Arc::new(NoopStatusSink),
            listener: Arc::new(NoopEventListener),
            metrics: Arc::new(HandoffMetrics::new()),
            transfer_id: Uuid::new_v4(),
        }
    }

    /// Set the status sink receiving progress snapshots.
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set the coordinator event listener.
    pub fn with_event_listener(mut self, listener: Arc<dyn HandoffEventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Share process-wide metrics.
    pub fn with_metrics(mut self, metrics: Arc<HandoffMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Id of this transfer attempt.
    pub fn transfer_id(&self) -> Uuid {
        self.transfer_id
    }

    /// Run the transfer end to end: resolve, connect, stream, final sync.
    pub async fn run(self) -> Result<HandoffSummary> {
        self.metrics.record_start();
        let outcome = self.connect_and_stream().await;
        self.finish(outcome)
    }

    /// Run the transfer over an already-established transport.
    pub async fn run_with_transport<T: Transport>(self, transport: T) -> Result<HandoffSummary> {
        self.metrics.record_start();
        let outcome = self.stream(transport).await;
        self.finish(outcome)
    }

    async fn connect_and_stream(&self) -> Result<HandoffSummary> {
        let addr = self.resolver.resolve(&self.request.target).await?;
        debug!(
            transfer_id = %self.transfer_id,
            listener = %addr,
            "Handoff listener resolved"
        );

        let transport = TcpTransport::connect(&addr, &self.config).await?;
        self.stream(transport).await
    }

    async fn stream<T: Transport>(&self, mut transport: T) -> Result<HandoffSummary> {
        // Handshaking: legacy sync exchange identifying the data module.
        transport
            .send_frame(wire::OLDSYNC, self.module.name().as_bytes())
            .await?;
        let reply = match transport.recv_frame().await {
            Ok(frame) => frame,
            // A close before the handshake reply is the receiver refusing
            // the transfer to enforce its concurrency cap.
            Err(Error::Network(NetworkError::ConnectionClosed)) => return Err(Error::Rejected),
            Err(e) => return Err(e),
        };
        if !reply.is_ack(wire::OLDSYNC) {
            return Err(NetworkError::Protocol(format!(
                "unexpected handshake reply (tag {})",
                reply.tag
            ))
            .into());
        }

        // Declare the target partition; no reply expected.
        transport
            .send_frame(wire::INIT, &self.request.dst_partition.to_be_bytes())
            .await?;

        let identity = self.identity();
        info!(
            transfer_id = %self.transfer_id,
            transfer = %identity,
            kind = %self.request.kind,
            "Starting handoff stream"
        );

        let fold_started = Instant::now();
        let mut visitor = SendVisitor {
            transport,
            state: TransferState::new(),
            stats: TransferStats::new(self.config.status_interval),
            module: Arc::clone(&self.module),
            filter: self.request.filter.clone().unwrap_or_else(accept_all),
            sink: Arc::clone(&self.sink),
            identity,
            ack_threshold: self.config.ack_threshold,
        };

        self.store
            .fold(self.request.src_partition, &mut visitor)
            .await
            .map_err(|e| Error::FoldEngine(e.to_string()))?;

        let SendVisitor {
            mut transport,
            state,
            stats,
            ..
        } = visitor;
        self.metrics.bytes_sent.inc_by(stats.bytes());
        self.metrics.objects_sent.inc_by(stats.objects());

        match state.error() {
            ErrorStatus::Ok => {}
            ErrorStatus::Failed(FailureReason::Timeout) => return Err(Error::Timeout),
            ErrorStatus::Failed(FailureReason::Encoding(reason)) => {
                return Err(Error::Encoding(reason.clone()))
            }
            ErrorStatus::Failed(FailureReason::Transport(reason)) => {
                return Err(Error::Fold(reason.clone()))
            }
        }

        // FinalSyncing: confirm the receiver has processed everything sent.
        transport.send_frame(wire::SYNC, wire::SYNC_ACK).await?;
        let reply = transport.recv_frame().await?;
        if !reply.is_ack(wire::SYNC) {
            return Err(NetworkError::Protocol(format!(
                "unexpected final-sync reply (tag {})",
                reply.tag
            ))
            .into());
        }

        Ok(HandoffSummary {
            transfer_id: self.transfer_id,
            module: self.module.name().to_string(),
            target: self.request.target.clone(),
            src_partition: self.request.src_partition,
            dst_partition: self.request.dst_partition,
            kind: self.request.kind,
            total_sent: state.total_sent(),
            bytes_sent: stats.bytes(),
            objects_sent: stats.objects(),
            duration: fold_started.elapsed(),
        })
    }

    /// Classify the outcome: metrics, terminal log, at-most-once event.
    fn finish(&self, outcome: Result<HandoffSummary>) -> Result<HandoffSummary> {
        let identity = self.identity();
        match outcome {
            Ok(summary) => {
                self.metrics.record_complete();
                info!(
                    transfer_id = %self.transfer_id,
                    transfer = %identity,
                    total_sent = summary.total_sent,
                    bytes_sent = summary.bytes_sent,
                    duration_ms = summary.duration.as_millis() as u64,
                    "Handoff completed"
                );
                if self.request.kind != TransferKind::Repair {
                    self.listener.on_event(HandoffEvent::Complete {
                        module: summary.module.clone(),
                        src_partition: summary.src_partition,
                        dst_partition: summary.dst_partition,
                        total_sent: summary.total_sent,
                    });
                }
                Ok(summary)
            }
            Err(Error::Timeout) => {
                self.metrics.record_timeout();
                warn!(
                    transfer_id = %self.transfer_id,
                    transfer = %identity,
                    "Handoff timed out"
                );
                Err(Error::Timeout)
            }
            Err(Error::Rejected) => {
                self.metrics.record_rejected();
                // Expected under receiver concurrency caps; the coordinator
                // schedules the retry.
                debug!(
                    transfer_id = %self.transfer_id,
                    transfer = %identity,
                    "Handoff rejected by receiver"
                );
                Err(Error::Rejected)
            }
            Err(e) => {
                self.metrics.record_failed();
                error!(
                    transfer_id = %self.transfer_id,
                    transfer = %identity,
                    error = %e,
                    "Handoff failed"
                );
                let kind = match &e {
                    Error::Network(NetworkError::ConnectFailed { .. }) => FailureKind::Unexpected,
                    Error::Fold(_) | Error::Encoding(_) | Error::Network(_) => {
                        FailureKind::FoldError
                    }
                    _ => FailureKind::Unexpected,
                };
                self.listener.on_event(HandoffEvent::Error {
                    kind,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn identity(&self) -> TransferIdentity {
        TransferIdentity {
            module: self.module.name().to_string(),
            target: self.request.target.clone(),
            src_partition: self.request.src_partition,
            dst_partition: self.request.dst_partition,
        }
    }
}

/// Per-item streaming state machine driven by the fold engine.
///
/// Each visit runs two explicit steps: possibly exchange a keep-alive when
/// the ack window is full, then process the item under the fresh window.
/// No item is dropped for the sake of a keep-alive, and stack depth stays
/// flat regardless of item count.
struct SendVisitor<T> {
    transport: T,
    state: TransferState,
    stats: TransferStats,
    module: Arc<dyn DataModule>,
    filter: KeyFilter,
    sink: Arc<dyn StatusSink>,
    identity: TransferIdentity,
    ack_threshold: usize,
}

#[async_trait]
impl<T: Transport> ItemVisitor for SendVisitor<T> {
    async fn visit(&mut self, key: &[u8], value: &[u8]) {
        // Once the connection is broken every further fold step is a cheap
        // no-op until the fold engine finishes iterating.
        if self.state.has_failed() {
            return;
        }

        if self.state.ack_count() >= self.ack_threshold {
            self.exchange_keepalive().await;
            if self.state.has_failed() {
                // The item that hit the boundary is lost for this transfer;
                // it surfaces as a short transfer at reconciliation.
                return;
            }
        }

        self.process_item(key, value).await;
    }
}

impl<T: Transport> SendVisitor<T> {
    async fn exchange_keepalive(&mut self) {
        match self.sync_round_trip().await {
            Ok(()) => {
                self.state.reset_window();
                self.state.clear_error();
                self.stats.record_bytes(wire::frame_len(wire::SYNC_ACK.len()));
                self.stats.maybe_report(self.sink.as_ref(), &self.identity);
            }
            Err(e) => {
                self.state.latch(FailureReason::from_error(&e));
                self.state.reset_window();
            }
        }
    }

    async fn sync_round_trip(&mut self) -> Result<()> {
        self.transport.send_frame(wire::SYNC, wire::SYNC_ACK).await?;
        let reply = self.transport.recv_frame().await?;
        if reply.is_ack(wire::SYNC) {
            Ok(())
        } else {
            Err(NetworkError::Protocol(format!("unexpected sync reply (tag {})", reply.tag)).into())
        }
    }

    async fn process_item(&mut self, key: &[u8], value: &[u8]) {
        // Filtered and attempted items both count, so sender and receiver
        // totals can be reconciled.
        self.state.count_item();
        if !(self.filter)(key) {
            return;
        }

        let encoded = match self.module.encode(key, value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.state.latch(FailureReason::Encoding(e.to_string()));
                return;
            }
        };

        match self.transport.send_frame(wire::OBJ, &encoded).await {
            Ok(()) => {
                self.state.record_send();
                self.stats.record_object(wire::frame_len(encoded.len()));
                self.stats.maybe_report(self.sink.as_ref(), &self.identity);
            }
            Err(e) => {
                self.state.latch(FailureReason::from_error(&e));
            }
        }
    }
}
