//! Sending side of the partition-handoff protocol for distributed,
//! partitioned stores.
//!
//! A handoff streams one partition's items from the node that owns them to
//! a peer over a dedicated TCP (optionally TLS) connection. This crate
//! implements the sender: handshake, the visitor-driven send loop with its
//! sliding acknowledgment window, periodic progress reporting, final-sync
//! completion, and a failure taxonomy that keeps rejection, timeout, and
//! generic errors distinct for the coordinator above.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Handoff Coordinator            │
//! │    (admission, retries: not this crate)     │
//! └─────────────────────────────────────────────┘
//!         │ TransferRequest          ▲ HandoffEvent / Result
//!         ▼                          │
//! ┌─────────────────────────────────────────────┐
//! │               HandoffSender                 │
//! │  • resolve listener, connect, handshake     │
//! │  • fold-driven send loop + ack window       │
//! │  • progress snapshots to the status sink    │
//! │  • final sync, outcome classification       │
//! └─────────────────────────────────────────────┘
//!         │                          ▲
//!         ▼                          │
//! ┌─────────────┐   ┌────────────┐   ┌──────────┐
//! │  Partition  │   │    Data    │   │ Listener │
//! │ Store(fold) │   │   Module   │   │ Resolver │
//! └─────────────┘   └────────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use handoff::{
//!     HandoffConfig, HandoffSender, NodeName, PartitionId, TransferRequest,
//! };
//! use std::sync::Arc;
//!
//! # async fn run(resolver: Arc<dyn handoff::ListenerResolver>,
//! #              store: Arc<dyn handoff::PartitionStore>,
//! #              module: Arc<dyn handoff::DataModule>) -> handoff::Result<()> {
//! let request = TransferRequest::new(
//!     NodeName::new("store@10.0.0.7"),
//!     PartitionId::from_u64(42),
//!     PartitionId::from_u64(42),
//! );
//!
//! let summary = HandoffSender::new(
//!     request,
//!     HandoffConfig::from_env(),
//!     resolver,
//!     store,
//!     module,
//! )
//! .run()
//! .await?;
//!
//! tracing::info!(total = summary.total_sent, "partition handed off");
//! # Ok(())
//! # }
//! ```
//!
//! # Flow control
//!
//! The sender pauses every `ack_threshold` items for a synchronous
//! keep-alive round trip. That bounds unacknowledged data in flight,
//! prevents the sender from outrunning the receiver, and detects a stalled
//! peer within one receive-timeout window instead of at end-of-stream.

pub mod cluster;
pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod testing;
pub mod transfer;
pub mod types;

// Re-export main types for convenience
pub use cluster::{
    FailureKind, HandoffEvent, HandoffEventListener, ListenerAddr, ListenerResolver,
    LoggingEventListener, NoopEventListener, StaticResolver,
};
pub use config::{HandoffConfig, TlsOptions};
pub use error::{Error, NetworkError, Result};
pub use transfer::{
    accept_all, DataModule, HandoffSender, HandoffSummary, ItemVisitor, KeyFilter,
    LoggingStatusSink, NoopStatusSink, PartitionStore, ProgressSnapshot, StatusSink,
    TransferIdentity, TransferRequest, TransferState, TransferStats,
};
pub use types::{NodeName, PartitionId, TransferKind, PARTITION_ID_LEN};

// Re-export metrics types
pub use metrics::{Counter, Gauge, HandoffMetrics, HandoffMetricsSnapshot};

// Re-export network types
pub use network::{Frame, TcpTransport, Transport};
