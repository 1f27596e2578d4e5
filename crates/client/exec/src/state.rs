//! Live account state: balances, nonces, code and storage, read from the native chain.

use crate::{EthAdapter, ExecError, ExecResult};
use ec_native_client::{BlockId as NativeBlockId, FunctionCall, NativeClientError, NativeResult, CONTRACT_NOT_FOUND};
use ep_block::execution::{BYTECODE, STORAGE};
use ep_block::rpc::BlockId;
use ep_block::{Address, Bytes, B256, U256};
use ep_convert::{felt_to_u64, felts_to_bytes, join_u256, split_u256};
use starknet_types_core::felt::Felt;

/// Treats a missing account as [`None`].
fn absent_as_none<T>(res: NativeResult<T>) -> NativeResult<Option<T>> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(NativeClientError::Rpc { code: CONTRACT_NOT_FOUND, .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

impl EthAdapter {
    /// `eth_getBalance`. The fee token answers 0 for accounts it has never seen, deployed or not.
    pub async fn get_balance(&self, address: Address, block: BlockId) -> ExecResult<U256> {
        let block_id = self.resolve_state_block(block).await?;
        let account = self.address_book.native_address(address);
        Ok(self.native.get_balance(self.config.chain.fee_token, account, block_id).await?)
    }

    /// `eth_getTransactionCount`, the native nonce of the mapped account.
    pub async fn get_transaction_count(&self, address: Address, block: BlockId) -> ExecResult<u64> {
        let block_id = self.resolve_state_block(block).await?;
        let account = self.address_book.native_address(address);
        Ok(self.native_nonce(block_id, account).await?.unwrap_or(0))
    }

    /// `eth_getCode`.
    pub async fn get_code(&self, address: Address, block: BlockId) -> ExecResult<Bytes> {
        let block_id = self.resolve_state_block(block).await?;
        let request = FunctionCall {
            contract_address: self.address_book.native_address(address),
            entry_point_selector: *BYTECODE,
            calldata: vec![],
        };
        let Some(felts) = absent_as_none(self.native.call(request, block_id).await)? else {
            return Ok(Bytes::new());
        };

        let Some((len, bytes)) = felts.split_first() else {
            return Err(ExecError::Internal("bytecode view returned nothing".to_string()));
        };
        let len = felt_to_u64(len)? as usize;
        if len != bytes.len() {
            return Err(ExecError::Internal(format!("bytecode view declared {len} bytes, returned {}", bytes.len())));
        }
        Ok(felts_to_bytes(bytes)?.into())
    }

    /// `eth_getStorageAt`.
    pub async fn get_storage_at(&self, address: Address, slot: U256, block: BlockId) -> ExecResult<B256> {
        let block_id = self.resolve_state_block(block).await?;
        let request = FunctionCall {
            contract_address: self.address_book.native_address(address),
            entry_point_selector: *STORAGE,
            calldata: split_u256(slot).to_vec(),
        };
        let Some(felts) = absent_as_none(self.native.call(request, block_id).await)? else {
            return Ok(B256::ZERO);
        };

        match felts.as_slice() {
            [low, high] => Ok(B256::from(join_u256(low, high)?.to_be_bytes::<32>())),
            other => Err(ExecError::Internal(format!("storage view returned {} felts", other.len()))),
        }
    }

    /// Native nonce of an account, [`None`] when it is not deployed.
    pub(crate) async fn native_nonce(&self, block_id: NativeBlockId, account: Felt) -> ExecResult<Option<u64>> {
        match absent_as_none(self.native.get_nonce(block_id, account).await)? {
            Some(nonce) => Ok(Some(felt_to_u64(&nonce)?)),
            None => Ok(None),
        }
    }
}
