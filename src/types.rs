//! Core types used throughout the handoff engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of a partition identifier on the wire, in bytes (160 bits).
pub const PARTITION_ID_LEN: usize = 20;

/// Identifier of a partition in the cluster key space.
///
/// Partition ids are 160-bit unsigned integers. They are carried on the wire
/// as fixed-width big-endian byte strings and rendered as hex in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionId([u8; PARTITION_ID_LEN]);

impl PartitionId {
    /// Create a partition id from its big-endian byte representation.
    pub const fn from_bytes(bytes: [u8; PARTITION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a partition id from a small integer (left-padded with zeros).
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; PARTITION_ID_LEN];
        bytes[PARTITION_ID_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    /// Big-endian byte representation, as sent in the init message.
    pub const fn to_be_bytes(self) -> [u8; PARTITION_ID_LEN] {
        self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hex without leading zero bytes, "0" for the zero id.
        match self.0.iter().position(|&b| b != 0) {
            Some(i) => {
                write!(f, "{:x}", self.0[i])?;
                for b in &self.0[i + 1..] {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            None => write!(f, "0"),
        }
    }
}

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionId({})", self)
    }
}

impl From<u64> for PartitionId {
    fn from(n: u64) -> Self {
        Self::from_u64(n)
    }
}

/// Name of a node in the cluster, in `service@host` form.
///
/// The host component is where the peer's handoff listener lives; the port
/// comes from the listener lookup, not from the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeName(String);

impl NodeName {
    /// Create a node name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Full name, e.g. `store@10.0.0.5`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host component of the name. Falls back to the whole name when there
    /// is no `@` separator.
    pub fn host(&self) -> &str {
        match self.0.split_once('@') {
            Some((_, host)) => host,
            None => &self.0,
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Kind of transfer being performed.
///
/// The kind only affects completion signaling: repair transfers are a
/// one-shot best-effort side channel and raise no completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Ordinary rebalance handoff; ownership follows the data.
    Ownership,
    /// Data repair; no ownership change, completion event suppressed.
    Repair,
    /// Ring resize handoff.
    Resize,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Ownership => write!(f, "ownership"),
            TransferKind::Repair => write!(f, "repair"),
            TransferKind::Resize => write!(f, "resize"),
        }
    }
}
