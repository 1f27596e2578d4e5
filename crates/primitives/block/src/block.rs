use alloy::primitives::{Address, Bloom, B256, U256};
use serde::{Deserialize, Serialize};

/// Header fields carried over from the native block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    /// Native block hash, reused as the Ethereum block hash so that parent linkage stays byte-identical.
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
    pub miner: Address,
    pub gas_limit: u64,
    pub base_fee_per_gas: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(flatten)]
    pub header: BlockHeader,
    pub gas_used: u64,
    pub logs_bloom: Bloom,
    /// Synthetic hashes of the block's transactions, in execution order.
    pub transactions: Vec<B256>,
}

impl Block {
    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn hash(&self) -> B256 {
        self.header.hash
    }

    pub fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }
}

/// Position of the canonical chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub number: u64,
    pub hash: B256,
}
