//! Data-module contract for handoff encoding.

use crate::error::Result;
use bytes::Bytes;
use std::sync::Arc;

/// A partitioned data module whose items can be handed off.
///
/// The engine is agnostic to payload structure; the module owns both the
/// name announced during the handshake and the item encoding.
pub trait DataModule: Send + Sync {
    /// Module name, sent verbatim in the handshake.
    fn name(&self) -> &str;

    /// Encode one item for the wire. Failures are fatal for the transfer.
    fn encode(&self, key: &[u8], value: &[u8]) -> Result<Bytes>;
}

/// Predicate deciding which keys take part in a transfer.
///
/// Filtered-out items are skipped on the wire but still counted, so sender
/// and receiver totals can be reconciled.
pub type KeyFilter = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// A filter that accepts every key.
pub fn accept_all() -> KeyFilter {
    Arc::new(|_| true)
}
