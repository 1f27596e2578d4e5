//! Document layouts of the MongoDB backend.
//!
//! Every payload document embeds the canonical type it stores next to the fields it is queried by. Hashes and
//! addresses are stored as `0x`-prefixed lowercase hex strings, numbers as 64-bit integers.

use crate::{StoreError, StoreResult};
use ep_block::{Block, ChainHead, Log, Receipt, Transaction, B256};
use serde::{Deserialize, Serialize};
use std::fmt::LowerHex;

pub const BLOCKS_COLLECTION: &str = "blocks";
pub const TRANSACTIONS_COLLECTION: &str = "transactions";
pub const RECEIPTS_COLLECTION: &str = "receipts";
pub const LOGS_COLLECTION: &str = "logs";
pub const CANONICAL_COLLECTION: &str = "canonical";
pub const META_COLLECTION: &str = "meta";

pub const PAYLOAD_COLLECTIONS: [&str; 4] =
    [BLOCKS_COLLECTION, TRANSACTIONS_COLLECTION, RECEIPTS_COLLECTION, LOGS_COLLECTION];

pub const HEAD_ID: &str = "head";

pub fn hex_key(value: &impl LowerHex) -> String {
    format!("{value:#x}")
}

pub fn to_i64(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::IntegerOverflow(value))
}

pub fn to_u64(value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative stored integer {value}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDocument {
    /// Block hash.
    #[serde(rename = "_id")]
    pub id: String,
    pub number: i64,
    pub tombstoned: bool,
    pub block: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDocument {
    /// `<block hash>:<transaction hash>`
    #[serde(rename = "_id")]
    pub id: String,
    pub hash: String,
    pub native_hash: String,
    pub block_hash: String,
    pub block_number: i64,
    pub transaction_index: i64,
    pub tombstoned: bool,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptDocument {
    /// `<block hash>:<transaction hash>`
    #[serde(rename = "_id")]
    pub id: String,
    pub transaction_hash: String,
    pub block_hash: String,
    pub block_number: i64,
    pub tombstoned: bool,
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogDocument {
    /// `<block hash>:<log index>`
    #[serde(rename = "_id")]
    pub id: String,
    pub block_hash: String,
    pub block_number: i64,
    pub log_index: i64,
    pub address: String,
    pub topics: Vec<String>,
    pub tombstoned: bool,
    pub log: Log,
}

/// Canonical pointer: the visible block hash at a height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub number: i64,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub number: i64,
    pub hash: String,
}

pub fn parse_hash(s: &str) -> StoreResult<B256> {
    s.parse().map_err(|_| StoreError::Corrupt(format!("invalid stored hash {s:?}")))
}

impl CanonicalDocument {
    pub fn new(number: u64, hash: B256) -> StoreResult<Self> {
        let number = to_i64(number)?;
        Ok(Self { id: number, number, hash: hex_key(&hash) })
    }
}

impl HeadDocument {
    pub fn new(head: ChainHead) -> StoreResult<Self> {
        Ok(Self { id: HEAD_ID.to_string(), number: to_i64(head.number)?, hash: hex_key(&head.hash) })
    }

    pub fn head(&self) -> StoreResult<ChainHead> {
        Ok(ChainHead { number: to_u64(self.number)?, hash: parse_hash(&self.hash)? })
    }
}

impl BlockDocument {
    pub fn new(block: &Block) -> StoreResult<Self> {
        Ok(Self { id: hex_key(&block.hash()), number: to_i64(block.number())?, tombstoned: false, block: block.clone() })
    }
}

impl TransactionDocument {
    pub fn new(tx: &Transaction) -> StoreResult<Self> {
        let block_hash = hex_key(&tx.block_hash);
        let hash = hex_key(&tx.hash);
        Ok(Self {
            id: format!("{block_hash}:{hash}"),
            hash,
            native_hash: tx.native_hash.to_hex_string(),
            block_hash,
            block_number: to_i64(tx.block_number)?,
            transaction_index: to_i64(tx.transaction_index)?,
            tombstoned: false,
            transaction: tx.clone(),
        })
    }
}

impl ReceiptDocument {
    pub fn new(receipt: &Receipt) -> StoreResult<Self> {
        let block_hash = hex_key(&receipt.block_hash);
        let transaction_hash = hex_key(&receipt.transaction_hash);
        Ok(Self {
            id: format!("{block_hash}:{transaction_hash}"),
            transaction_hash,
            block_hash,
            block_number: to_i64(receipt.block_number)?,
            tombstoned: false,
            receipt: receipt.clone(),
        })
    }
}

impl LogDocument {
    pub fn new(log: &Log) -> StoreResult<Self> {
        let block_hash = hex_key(&log.block_hash);
        Ok(Self {
            id: format!("{block_hash}:{}", log.log_index),
            block_hash,
            block_number: to_i64(log.block_number)?,
            log_index: to_i64(log.log_index)?,
            address: hex_key(&log.address),
            topics: log.topics.iter().map(hex_key).collect(),
            tombstoned: false,
            log: log.clone(),
        })
    }
}
