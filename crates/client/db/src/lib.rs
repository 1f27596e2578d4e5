//! Canonical store of the Ethereum-shaped chain materialized by the indexer.
//!
//! # Visibility
//!
//! Payload documents (blocks, transactions, receipts, logs) are written under their block hash, so that two
//! forks of the same height never overwrite each other. A block only becomes visible once the `canonical`
//! pointer for its number is flipped to its hash, and every read resolves through those pointers. A reader
//! therefore sees either the previous block at a height or the complete new one, never a mix of both.
//!
//! Superseded blocks are tombstoned, not purged.
//!
//! # Writers
//!
//! The indexer is the only writer. [`StoreWrite`] methods are not meant to be called concurrently.

use async_trait::async_trait;
use ep_block::{Block, BlockBundle, ChainHead, Felt, Log, LogFilter, Receipt, Transaction, B256};

mod error;
mod memory;
mod mongo;
#[cfg(test)]
mod tests;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use mongo::{MongoStore, MongoStoreConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The block was already canonical, nothing was written.
    AlreadyCanonical,
}

#[async_trait]
pub trait StoreRead: Send + Sync {
    async fn head(&self) -> StoreResult<Option<ChainHead>>;

    async fn canonical_hash(&self, number: u64) -> StoreResult<Option<B256>>;

    async fn block_by_number(&self, number: u64) -> StoreResult<Option<Block>>;

    /// Only canonical blocks are returned.
    async fn block_by_hash(&self, hash: B256) -> StoreResult<Option<Block>>;

    /// Transactions of a canonical block, in block order.
    async fn block_transactions(&self, block: &Block) -> StoreResult<Vec<Transaction>>;

    async fn transaction(&self, hash: B256) -> StoreResult<Option<Transaction>>;

    async fn transaction_by_native_hash(&self, native_hash: Felt) -> StoreResult<Option<Transaction>>;

    async fn receipt(&self, transaction_hash: B256) -> StoreResult<Option<Receipt>>;

    /// Canonical logs matching the filter, ordered by block number then block-level log index.
    async fn logs(&self, filter: &LogFilter) -> StoreResult<Vec<Log>>;
}

#[async_trait]
pub trait StoreWrite: StoreRead {
    /// Makes `bundle` the canonical block at its height.
    ///
    /// The block must extend the canonical chain: its number is at most `head + 1` and its parent hash is the
    /// canonical hash at `number - 1`. Committing below the head replaces the block at that height and retracts
    /// everything above it. Committing a block which is already canonical is a no-op, unless the head is below
    /// it: the pointer was flipped by a commit which never completed, and this one completes it.
    async fn commit_block(&self, bundle: &BlockBundle) -> StoreResult<CommitOutcome>;

    /// Tombstones every canonical block above `to` and moves the head to `to`. `None` empties the chain.
    async fn rewind(&self, to: Option<u64>) -> StoreResult<()>;
}

/// Checks that `bundle` can be committed on top of the current canonical chain.
///
/// * `head`: the current head.
/// * `current`: the canonical hash at the bundle's height.
/// * `parent`: the canonical hash at the height below.
///
/// Returns [`Some`] when the commit must be skipped.
pub(crate) fn check_commit(
    bundle: &BlockBundle,
    head: Option<ChainHead>,
    current: Option<B256>,
    parent: Option<B256>,
) -> StoreResult<Option<CommitOutcome>> {
    let number = bundle.number();
    if current == Some(bundle.hash()) {
        if head.is_some_and(|head| head.number >= number) {
            return Ok(Some(CommitOutcome::AlreadyCanonical));
        }
        // interrupted after the pointer flip, the head still lags
        return Ok(None);
    }

    let Some(head) = head else {
        // first block, indexing can start at any height
        return Ok(None);
    };
    if number > head.number.saturating_add(1) {
        return Err(StoreError::NotContiguous { number, head: head.number });
    }
    match parent {
        Some(canonical) if canonical != bundle.block.parent_hash() => {
            Err(StoreError::ParentMismatch { number, parent: bundle.block.parent_hash(), canonical })
        }
        _ => Ok(None),
    }
}
