//! Error types for the handoff engine.

use std::io;
use thiserror::Error;

/// Result type alias for handoff operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the handoff engine.
///
/// Every variant is terminal for a transfer; nothing is retried internally.
/// The coordinator reacts differently to the three shutdown classes
/// (rejection, timeout, generic failure), so they must stay distinct.
#[derive(Error, Debug)]
pub enum Error {
    /// Listener address lookup failed before any socket was opened.
    #[error("listener resolution failed for {node}: {reason}")]
    Resolve { node: String, reason: String },

    /// Network communication errors.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// The receiver refused the transfer to enforce its concurrency cap,
    /// signaled by closing the socket before the handshake reply.
    #[error("handoff rejected by receiver (max concurrency)")]
    Rejected,

    /// A receive exceeded the configured timeout, at handshake, mid-stream
    /// keep-alive, or final sync.
    #[error("handoff timed out")]
    Timeout,

    /// The data module failed to encode an item.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Streaming failed mid-fold; carries the original latched cause.
    #[error("fold error: {0}")]
    Fold(String),

    /// The fold engine call itself failed.
    #[error("fold engine failure: {0}")]
    FoldEngine(String),

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
}

/// Network communication errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed.
    #[error("connection failed to {addr}: {reason}")]
    ConnectFailed { addr: String, reason: String },

    /// Connection was closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Failed to send a frame.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Failed to receive a frame.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Peer sent something outside the wire protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Inbound frame exceeded the size bound.
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Address parse/lookup error.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Whether this error classifies as a timeout outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Whether this error classifies as a max-concurrency rejection.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Rejected)
    }
}
