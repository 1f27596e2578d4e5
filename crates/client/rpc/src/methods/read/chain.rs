use alloy::primitives::U64;
use ep_block::rpc::SyncStatus;
use ep_block::U256;

use crate::utils::ResultExt;
use crate::{Eth, EthRpcResult};

/// Number of the canonical head, `0x0` until the first block is indexed.
pub async fn block_number(eth: &Eth) -> EthRpcResult<U64> {
    let head = eth.adapter.store().head().await.or_internal_server_error("Error getting the canonical head")?;
    Ok(U64::from(head.map(|head| head.number).unwrap_or(0)))
}

/// `false` once the canonical store has caught up with the native chain.
pub async fn syncing(eth: &Eth) -> EthRpcResult<SyncStatus> {
    Ok(eth.adapter.syncing().await?)
}

pub async fn gas_price(eth: &Eth) -> EthRpcResult<U256> {
    Ok(eth.adapter.gas_price().await?)
}
