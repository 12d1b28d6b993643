//! The handoff transfer engine.
//!
//! One transfer streams the contents of a source partition to a peer's
//! handoff listener over a dedicated connection:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       HandoffSender                        │
//! │                                                            │
//! │  resolve ──► connect ──► handshake ──► init                │
//! │                                         │                  │
//! │                                         ▼                  │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │ fold(partition) ──► SendVisitor per item:            │  │
//! │  │   keep-alive every N items ─ filter ─ encode ─ send  │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                                         │                  │
//! │                                         ▼                  │
//! │                final sync ──► summary / outcome            │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ack window bounds unacknowledged data in flight and detects a
//! stalled receiver within one receive-timeout window; it is the engine's
//! only flow-control mechanism.

mod fold;
mod module;
mod sender;
mod state;
mod stats;

pub use fold::{ItemVisitor, PartitionStore};
pub use module::{accept_all, DataModule, KeyFilter};
pub use sender::{HandoffSender, HandoffSummary, TransferRequest};
pub use state::{ErrorStatus, FailureReason, TransferState};
pub use stats::{
    LoggingStatusSink, NoopStatusSink, ProgressSnapshot, StatusSink, TransferIdentity,
    TransferStats,
};
