use alloy::primitives::U64;
use ep_block::rpc::{BlockId, CallRequest};
use ep_block::Bytes;

use crate::{Eth, EthRpcApiError, EthRpcResult};

fn check_request(request: &CallRequest) -> EthRpcResult<()> {
    if let (Some(input), Some(data)) = (&request.input, &request.data) {
        if input != data {
            return Err(EthRpcApiError::InvalidParams("Both input and data are set and differ".to_string()));
        }
    }
    if request.gas_price.is_some() && request.max_fee_per_gas.is_some() {
        return Err(EthRpcApiError::InvalidParams(
            "Both gasPrice and maxFeePerGas are set, only one is allowed".to_string(),
        ));
    }
    Ok(())
}

/// Executes the request against the execution contract's view entry point.
///
/// # Errors
///
/// - `ExecutionReverted` with the revert data when the EVM reverts.
pub async fn call(eth: &Eth, request: CallRequest, block: BlockId) -> EthRpcResult<Bytes> {
    check_request(&request)?;
    Ok(eth.adapter.call(request, block).await?)
}

pub async fn estimate_gas(eth: &Eth, request: CallRequest, block: Option<BlockId>) -> EthRpcResult<U64> {
    check_request(&request)?;
    Ok(U64::from(eth.adapter.estimate_gas(request, block).await?))
}
