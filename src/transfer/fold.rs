//! Fold-engine contract.
//!
//! The partition's owning vnode iterates its items and drives a visitor
//! once per (key, value) pair. Iteration order is engine-determined and
//! must not be relied on. The fold cannot be cancelled mid-iteration;
//! a visitor that can no longer make progress turns the remaining calls
//! into no-ops instead.

use crate::error::Result;
use crate::types::PartitionId;
use async_trait::async_trait;

/// Callback driven by the fold engine, once per stored item.
#[async_trait]
pub trait ItemVisitor: Send {
    /// Visit one item.
    async fn visit(&mut self, key: &[u8], value: &[u8]);
}

/// A store capable of folding over one partition's items.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Invoke `visitor` for every item in `partition`.
    ///
    /// An error from this call means the fold engine itself failed, which
    /// is distinct from transport trouble the visitor absorbs internally.
    async fn fold(
        &self,
        partition: PartitionId,
        visitor: &mut (dyn ItemVisitor + Send),
    ) -> Result<()>;
}
