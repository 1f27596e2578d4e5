use alloy::primitives::U64;
use ep_block::rpc::{BlockNumberOrTag, RpcReceipt, RpcTransaction};
use ep_block::B256;

use crate::{Eth, EthRpcResult};

pub async fn get_transaction_by_hash(eth: &Eth, hash: B256) -> EthRpcResult<Option<RpcTransaction>> {
    Ok(eth.adapter.get_transaction_by_hash(hash).await?)
}

pub async fn get_transaction_by_block_number_and_index(
    eth: &Eth,
    number: BlockNumberOrTag,
    index: U64,
) -> EthRpcResult<Option<RpcTransaction>> {
    Ok(eth.adapter.get_transaction_by_block_number_and_index(number, index.to()).await?)
}

pub async fn get_transaction_by_block_hash_and_index(
    eth: &Eth,
    hash: B256,
    index: U64,
) -> EthRpcResult<Option<RpcTransaction>> {
    Ok(eth.adapter.get_transaction_by_block_hash_and_index(hash, index.to()).await?)
}

/// Receipt of an indexed transaction. `null` while the transaction is not part of the canonical chain.
pub async fn get_transaction_receipt(eth: &Eth, hash: B256) -> EthRpcResult<Option<RpcReceipt>> {
    Ok(eth.adapter.get_transaction_receipt(hash).await?)
}
