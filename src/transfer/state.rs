//! Per-transfer accumulator state threaded through the fold.

use crate::error::Error;
use std::fmt;

/// Cause of a latched streaming failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// A send or receive exceeded its bound.
    Timeout,
    /// A send/receive I/O or protocol error other than timeout.
    Transport(String),
    /// The data module could not encode an item.
    Encoding(String),
}

impl FailureReason {
    /// Classify an engine error into a latchable reason.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Timeout => FailureReason::Timeout,
            Error::Encoding(reason) => FailureReason::Encoding(reason.clone()),
            other => FailureReason::Transport(other.to_string()),
        }
    }

    /// Whether this reason classifies as a timeout outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FailureReason::Timeout)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Transport(reason) => write!(f, "{}", reason),
            FailureReason::Encoding(reason) => write!(f, "encoding: {}", reason),
        }
    }
}

/// Streaming error state. A latch, not a flag: once failed it stays failed
/// for the rest of the fold, except for the explicit keep-alive recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorStatus {
    /// Streaming is healthy.
    Ok,
    /// Streaming failed; every further visit is a no-op.
    Failed(FailureReason),
}

impl ErrorStatus {
    /// Check if streaming is still healthy.
    pub fn is_ok(&self) -> bool {
        matches!(self, ErrorStatus::Ok)
    }
}

/// Mutable state threaded through every visitor invocation.
///
/// Owned exclusively by the streaming loop; nothing mutates it
/// concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    ack_count: usize,
    total_sent: u64,
    error: ErrorStatus,
}

impl TransferState {
    /// Fresh state for a new transfer.
    pub fn new() -> Self {
        Self {
            ack_count: 0,
            total_sent: 0,
            error: ErrorStatus::Ok,
        }
    }

    /// Items sent since the last confirmed round trip.
    pub fn ack_count(&self) -> usize {
        self.ack_count
    }

    /// Items counted so far: transmitted, attempted, or filtered out.
    /// Monotonically non-decreasing.
    pub fn total_sent(&self) -> u64 {
        self.total_sent
    }

    /// Current error state.
    pub fn error(&self) -> &ErrorStatus {
        &self.error
    }

    /// Check if a failure has been latched.
    pub fn has_failed(&self) -> bool {
        !self.error.is_ok()
    }

    /// Count one item toward the transfer total.
    pub fn count_item(&mut self) {
        self.total_sent += 1;
    }

    /// Record one unacknowledged item send.
    pub fn record_send(&mut self) {
        self.ack_count += 1;
    }

    /// Reset the ack window after a keep-alive exchange, confirmed or not.
    pub fn reset_window(&mut self) {
        self.ack_count = 0;
    }

    /// Latch a failure. The first failure wins; later ones are ignored.
    pub fn latch(&mut self, reason: FailureReason) {
        if self.error.is_ok() {
            self.error = ErrorStatus::Failed(reason);
        }
    }

    /// Clear the error state after a confirmed keep-alive round trip; the
    /// completed exchange is direct evidence the transport is usable.
    pub fn clear_error(&mut self) {
        self.error = ErrorStatus::Ok;
    }
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}
