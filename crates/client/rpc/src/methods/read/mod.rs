use alloy::primitives::U64;
use ep_block::rpc::{BlockId, BlockNumberOrTag, CallRequest, Filter, RpcBlock, RpcLog, RpcReceipt, RpcTransaction, SyncStatus};
use ep_block::{Address, Bytes, B256, U256};
use jsonrpsee::core::{async_trait, RpcResult};

use crate::{Eth, EthReadRpcApiServer};

mod block;
mod call;
mod chain;
mod logs;
mod state;
mod transaction;

#[async_trait]
impl EthReadRpcApiServer for Eth {
    fn chain_id(&self) -> RpcResult<U64> {
        Ok(U64::from(self.adapter.chain_id()))
    }

    async fn block_number(&self) -> RpcResult<U64> {
        Ok(chain::block_number(self).await?)
    }

    async fn syncing(&self) -> RpcResult<SyncStatus> {
        Ok(chain::syncing(self).await?)
    }

    async fn gas_price(&self) -> RpcResult<U256> {
        Ok(chain::gas_price(self).await?)
    }

    async fn get_balance(&self, address: Address, block: Option<BlockId>) -> RpcResult<U256> {
        Ok(state::get_balance(self, address, block.unwrap_or_default()).await?)
    }

    async fn get_transaction_count(&self, address: Address, block: Option<BlockId>) -> RpcResult<U64> {
        Ok(state::get_transaction_count(self, address, block.unwrap_or_default()).await?)
    }

    async fn get_code(&self, address: Address, block: Option<BlockId>) -> RpcResult<Bytes> {
        Ok(state::get_code(self, address, block.unwrap_or_default()).await?)
    }

    async fn get_storage_at(&self, address: Address, slot: U256, block: Option<BlockId>) -> RpcResult<B256> {
        Ok(state::get_storage_at(self, address, slot, block.unwrap_or_default()).await?)
    }

    async fn call(&self, request: CallRequest, block: Option<BlockId>) -> RpcResult<Bytes> {
        Ok(call::call(self, request, block.unwrap_or_default()).await?)
    }

    async fn estimate_gas(&self, request: CallRequest, block: Option<BlockId>) -> RpcResult<U64> {
        Ok(call::estimate_gas(self, request, block).await?)
    }

    async fn get_block_by_number(&self, number: BlockNumberOrTag, full: bool) -> RpcResult<Option<RpcBlock>> {
        Ok(block::get_block_by_number(self, number, full).await?)
    }

    async fn get_block_by_hash(&self, hash: B256, full: bool) -> RpcResult<Option<RpcBlock>> {
        Ok(block::get_block_by_hash(self, hash, full).await?)
    }

    async fn get_block_transaction_count_by_number(&self, number: BlockNumberOrTag) -> RpcResult<Option<U64>> {
        Ok(block::get_block_transaction_count_by_number(self, number).await?)
    }

    async fn get_block_transaction_count_by_hash(&self, hash: B256) -> RpcResult<Option<U64>> {
        Ok(block::get_block_transaction_count_by_hash(self, hash).await?)
    }

    async fn get_transaction_by_hash(&self, hash: B256) -> RpcResult<Option<RpcTransaction>> {
        Ok(transaction::get_transaction_by_hash(self, hash).await?)
    }

    async fn get_transaction_by_block_number_and_index(
        &self,
        number: BlockNumberOrTag,
        index: U64,
    ) -> RpcResult<Option<RpcTransaction>> {
        Ok(transaction::get_transaction_by_block_number_and_index(self, number, index).await?)
    }

    async fn get_transaction_by_block_hash_and_index(
        &self,
        hash: B256,
        index: U64,
    ) -> RpcResult<Option<RpcTransaction>> {
        Ok(transaction::get_transaction_by_block_hash_and_index(self, hash, index).await?)
    }

    async fn get_transaction_receipt(&self, hash: B256) -> RpcResult<Option<RpcReceipt>> {
        Ok(transaction::get_transaction_receipt(self, hash).await?)
    }

    async fn get_logs(&self, filter: Filter) -> RpcResult<Vec<RpcLog>> {
        Ok(logs::get_logs(self, filter).await?)
    }
}
