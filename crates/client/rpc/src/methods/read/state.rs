//! Live account state, read from the native chain at the requested block.

use alloy::primitives::U64;
use ep_block::rpc::BlockId;
use ep_block::{Address, Bytes, B256, U256};

use crate::{Eth, EthRpcResult};

/// Balance in the native fee token. An address without an account has a zero balance.
pub async fn get_balance(eth: &Eth, address: Address, block: BlockId) -> EthRpcResult<U256> {
    Ok(eth.adapter.get_balance(address, block).await?)
}

pub async fn get_transaction_count(eth: &Eth, address: Address, block: BlockId) -> EthRpcResult<U64> {
    Ok(U64::from(eth.adapter.get_transaction_count(address, block).await?))
}

pub async fn get_code(eth: &Eth, address: Address, block: BlockId) -> EthRpcResult<Bytes> {
    Ok(eth.adapter.get_code(address, block).await?)
}

pub async fn get_storage_at(eth: &Eth, address: Address, slot: U256, block: BlockId) -> EthRpcResult<B256> {
    Ok(eth.adapter.get_storage_at(address, slot, block).await?)
}
