//! `eth_call` and `eth_estimateGas`.

use crate::{EthAdapter, ExecError, ExecResult};
use alloy::consensus::{SignableTransaction, TxEip1559};
use alloy::primitives::TxKind;
use ec_native_client::{BlockId as NativeBlockId, BroadcastedInvokeV1, FunctionCall, NativeClientError};
use ep_block::execution::{
    decode_eth_call_result, encode_eth_call_calldata, encode_execute_calldata, ExecutionOutcome, ETH_CALL,
};
use ep_block::rpc::{BlockId, CallRequest};
use ep_block::{Address, Bytes, U256};
use ep_convert::{felt_to_u64, CodecError};
use starknet_types_core::felt::Felt;

/// Number of signature felts the execution contract expects, see `EvmSignature::to_felts`.
const SIGNATURE_LEN: usize = 5;

fn call_gas_price(request: &CallRequest) -> ExecResult<u128> {
    let price = request.gas_price.or(request.max_fee_per_gas).unwrap_or_default();
    Ok(u128::try_from(price).map_err(|_| CodecError::out_of_range(price, "gas price"))?)
}

impl EthAdapter {
    /// Maps a native execution failure onto an EVM revert, recovering the revert bytes from the error trace when
    /// the decoder understands it.
    pub(crate) fn revert_from_native(&self, revert_error: &str) -> ExecError {
        match self.revert_decoder.decode(revert_error) {
            Some(data) => ExecError::reverted(data),
            None => {
                tracing::debug!("No revert data in native error trace: {revert_error}");
                ExecError::reverted(Bytes::new())
            }
        }
    }

    async fn execute_view(&self, request: &CallRequest, block_id: NativeBlockId) -> ExecResult<ExecutionOutcome> {
        let calldata = encode_eth_call_calldata(
            request.from.unwrap_or(Address::ZERO),
            request.to,
            request.gas.unwrap_or(self.config.chain.block_gas_limit),
            call_gas_price(request)?,
            request.value.unwrap_or(U256::ZERO),
            request.call_data(),
        );
        let call = FunctionCall {
            contract_address: self.config.chain.execution_contract,
            entry_point_selector: *ETH_CALL,
            calldata,
        };

        let felts = match self.native.call(call, block_id).await {
            Ok(felts) => felts,
            Err(NativeClientError::ContractError { revert_error }) => return Err(self.revert_from_native(&revert_error)),
            Err(err) => return Err(err.into()),
        };
        let outcome = decode_eth_call_result(&felts)
            .map_err(|err| ExecError::Internal(format!("Malformed eth_call result: {err}")))?;
        if !outcome.success {
            return Err(ExecError::reverted(outcome.return_data));
        }
        Ok(outcome)
    }

    /// `eth_call`.
    pub async fn call(&self, request: CallRequest, block: BlockId) -> ExecResult<Bytes> {
        let block_id = self.resolve_state_block(block).await?;
        Ok(self.execute_view(&request, block_id).await?.return_data.into())
    }

    /// `eth_estimateGas`.
    ///
    /// The request is wrapped in an unsigned query invoke from the sender's account and estimated without
    /// validation. A sender without an account cannot be estimated natively, the gas used by the `eth_call` view
    /// is reported instead.
    pub async fn estimate_gas(&self, request: CallRequest, block: Option<BlockId>) -> ExecResult<u64> {
        let block_id = self.resolve_state_block(block.unwrap_or_default()).await?;
        let gas_scale = self.config.chain.gas_scale;
        let sender = self.address_book.native_address(request.from.unwrap_or(Address::ZERO));

        if self.native.get_class_hash_at(block_id, sender).await?.is_none() {
            let outcome = self.execute_view(&request, block_id).await?;
            return Ok(gas_scale.to_evm_gas(outcome.native_gas_used));
        }
        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => self.native_nonce(block_id, sender).await?.unwrap_or(0),
        };

        let payload = self.query_payload(&request, nonce)?;
        let transaction = BroadcastedInvokeV1 {
            sender_address: sender,
            calldata: encode_execute_calldata(self.config.chain.execution_contract, &payload),
            max_fee: self.config.chain.max_fee,
            signature: vec![Felt::ZERO; SIGNATURE_LEN],
            nonce: Felt::from(nonce),
            is_query: true,
        };

        let estimate = match self.native.estimate_fee(transaction, block_id).await {
            Ok(estimate) => estimate,
            Err(NativeClientError::ContractError { revert_error }) => return Err(self.revert_from_native(&revert_error)),
            Err(err) => return Err(err.into()),
        };
        Ok(gas_scale.to_evm_gas(felt_to_u64(&estimate.gas_consumed)?))
    }

    /// Unsigned EIP-1559 signing payload carrying the call request.
    fn query_payload(&self, request: &CallRequest, nonce: u64) -> ExecResult<Vec<u8>> {
        let max_fee_per_gas = call_gas_price(request)?;
        let max_priority_fee_per_gas = match request.max_priority_fee_per_gas {
            Some(fee) => u128::try_from(fee).map_err(|_| CodecError::out_of_range(fee, "priority fee"))?,
            None => 0,
        };
        let tx = TxEip1559 {
            chain_id: self.config.chain.chain_id,
            nonce,
            gas_limit: request.gas.unwrap_or(self.config.chain.block_gas_limit),
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: request.to.map(TxKind::Call).unwrap_or(TxKind::Create),
            value: request.value.unwrap_or(U256::ZERO),
            access_list: Default::default(),
            input: Bytes::copy_from_slice(request.call_data()),
        };
        Ok(tx.encoded_for_signing())
    }
}
