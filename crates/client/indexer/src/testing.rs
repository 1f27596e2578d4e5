//! A scripted native chain for pipeline tests.
//!
//! Block `n` of fork `f` has hash `replay_hash(n, f)`. Block `0` is shared by every fork.

use crate::BlockSource;
use async_trait::async_trait;
use ec_native_client::{BlockHashAndNumber, NativeBlock, NativeBlockHeader, NativeClientError, NativeResult, ResourcePrice};
use starknet_types_core::felt::Felt;
use std::sync::{Mutex, MutexGuard};

pub fn replay_hash(number: u64, fork: u64) -> Felt {
    if number == 0 {
        return Felt::from(0xb10c_0000_0000u64);
    }
    Felt::from(0xb10c_0000_0000u64 + (fork << 32) + number)
}

/// An empty block `number` of fork `fork`, linked to block `number - 1` of `parent_fork`.
pub fn replay_block(number: u64, fork: u64, parent_fork: u64) -> NativeBlock {
    NativeBlock {
        header: NativeBlockHeader {
            block_hash: replay_hash(number, fork),
            parent_hash: if number == 0 { Felt::ZERO } else { replay_hash(number - 1, parent_fork) },
            block_number: number,
            timestamp: 1_700_000_000 + number,
            sequencer_address: Felt::from(0x5e9u64),
            l1_gas_price: ResourcePrice { price_in_fri: Felt::ZERO, price_in_wei: Felt::ONE },
        },
        transactions: vec![],
    }
}

#[derive(Default)]
struct State {
    blocks: Vec<NativeBlock>,
    failures: Vec<NativeClientError>,
}

#[derive(Default)]
pub struct ReplaySource {
    state: Mutex<State>,
}

impl ReplaySource {
    pub fn new(blocks: Vec<NativeBlock>) -> Self {
        Self { state: Mutex::new(State { blocks, failures: vec![] }) }
    }

    /// Blocks `0..=head` of fork `fork`.
    pub fn linear(head: u64, fork: u64) -> Self {
        Self::new((0..=head).map(|n| replay_block(n, fork, fork)).collect())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("Poisoned lock")
    }

    /// Replaces every block from `from` onwards with blocks of `fork` up to `head` (inclusive).
    pub fn reorg(&self, from: u64, fork: u64, head: u64) {
        let mut state = self.state();
        state.blocks.truncate(from as usize);
        let mut parent_hash = state.blocks.last().map(|block| block.header.block_hash);
        for number in from..=head {
            let mut block = replay_block(number, fork, fork);
            if let Some(parent_hash) = parent_hash.take() {
                block.header.parent_hash = parent_hash;
            }
            state.blocks.push(block);
        }
    }

    /// Drops every block above `head`.
    pub fn truncate(&self, head: u64) {
        self.state().blocks.truncate(head as usize + 1);
    }

    pub fn push(&self, block: NativeBlock) {
        self.state().blocks.push(block);
    }

    /// Queues errors returned, in order, by the next calls.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = NativeClientError>) {
        self.state().failures.extend(errors);
    }

    fn enter(&self) -> NativeResult<MutexGuard<'_, State>> {
        let mut state = self.state();
        if !state.failures.is_empty() {
            return Err(state.failures.remove(0));
        }
        Ok(state)
    }
}

#[async_trait]
impl BlockSource for ReplaySource {
    async fn latest(&self) -> NativeResult<BlockHashAndNumber> {
        let state = self.enter()?;
        let head = state.blocks.last().ok_or_else(|| NativeClientError::Client("Empty replay".to_string()))?;
        Ok(BlockHashAndNumber { block_hash: head.header.block_hash, block_number: head.header.block_number })
    }

    async fn block(&self, number: u64) -> NativeResult<Option<NativeBlock>> {
        Ok(self.enter()?.blocks.get(number as usize).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reorg_links_to_old_fork() {
        let source = ReplaySource::linear(4, 0);
        source.reorg(3, 1, 5);
        let block = source.block(3).await.unwrap().unwrap();
        assert_eq!(block.header.parent_hash, replay_hash(2, 0));
        assert_eq!(block.header.block_hash, replay_hash(3, 1));
        assert_eq!(source.block(5).await.unwrap().unwrap().header.parent_hash, replay_hash(4, 1));
        assert_eq!(source.latest().await.unwrap().block_number, 5);

        source.reorg(4, 2, 4);
        assert_eq!(source.block(4).await.unwrap().unwrap().header.parent_hash, replay_hash(3, 1));
    }
}
