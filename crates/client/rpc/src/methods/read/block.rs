use alloy::primitives::U64;
use ep_block::rpc::{BlockNumberOrTag, RpcBlock};
use ep_block::B256;

use crate::{Eth, EthRpcResult};

/// The canonical block at `number`, with full transaction objects when `full` is set, or only their hashes.
/// `null` above the head.
pub async fn get_block_by_number(eth: &Eth, number: BlockNumberOrTag, full: bool) -> EthRpcResult<Option<RpcBlock>> {
    Ok(eth.adapter.get_block_by_number(number, full).await?)
}

/// `null` for unknown and superseded blocks.
pub async fn get_block_by_hash(eth: &Eth, hash: B256, full: bool) -> EthRpcResult<Option<RpcBlock>> {
    Ok(eth.adapter.get_block_by_hash(hash, full).await?)
}

pub async fn get_block_transaction_count_by_number(eth: &Eth, number: BlockNumberOrTag) -> EthRpcResult<Option<U64>> {
    Ok(eth.adapter.get_block_transaction_count_by_number(number).await?.map(U64::from))
}

pub async fn get_block_transaction_count_by_hash(eth: &Eth, hash: B256) -> EthRpcResult<Option<U64>> {
    Ok(eth.adapter.get_block_transaction_count_by_hash(hash).await?.map(U64::from))
}
