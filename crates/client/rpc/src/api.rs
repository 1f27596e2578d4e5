//! Ethereum JSON-RPC API traits.
//!
//! Method names and parameter shapes follow the [Ethereum execution API](https://ethereum.github.io/execution-apis/api-documentation/).
//! Quantities are returned as [`U64`]/[`U256`] so that they serialize as `0x`-prefixed hex.

use alloy::primitives::U64;
use ep_block::rpc::{BlockId, BlockNumberOrTag, CallRequest, Filter, RpcBlock, RpcLog, RpcReceipt, RpcTransaction, SyncStatus};
use ep_block::{Address, Bytes, B256, U256};
use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

/// Ethereum read rpc interface.
#[rpc(server, namespace = "eth")]
pub trait EthReadRpcApi {
    /// Chain id used for EIP-155 replay protection
    #[method(name = "chainId")]
    fn chain_id(&self) -> RpcResult<U64>;

    /// Number of the most recent indexed block
    #[method(name = "blockNumber")]
    async fn block_number(&self) -> RpcResult<U64>;

    #[method(name = "syncing")]
    async fn syncing(&self) -> RpcResult<SyncStatus>;

    #[method(name = "gasPrice")]
    async fn gas_price(&self) -> RpcResult<U256>;

    /// Balance of the account in the native fee token
    #[method(name = "getBalance")]
    async fn get_balance(&self, address: Address, block: Option<BlockId>) -> RpcResult<U256>;

    #[method(name = "getTransactionCount")]
    async fn get_transaction_count(&self, address: Address, block: Option<BlockId>) -> RpcResult<U64>;

    #[method(name = "getCode")]
    async fn get_code(&self, address: Address, block: Option<BlockId>) -> RpcResult<Bytes>;

    #[method(name = "getStorageAt")]
    async fn get_storage_at(&self, address: Address, slot: U256, block: Option<BlockId>) -> RpcResult<B256>;

    /// Executes a message call without creating a transaction
    #[method(name = "call")]
    async fn call(&self, request: CallRequest, block: Option<BlockId>) -> RpcResult<Bytes>;

    #[method(name = "estimateGas")]
    async fn estimate_gas(&self, request: CallRequest, block: Option<BlockId>) -> RpcResult<U64>;

    #[method(name = "getBlockByNumber")]
    async fn get_block_by_number(&self, number: BlockNumberOrTag, full: bool) -> RpcResult<Option<RpcBlock>>;

    #[method(name = "getBlockByHash")]
    async fn get_block_by_hash(&self, hash: B256, full: bool) -> RpcResult<Option<RpcBlock>>;

    #[method(name = "getBlockTransactionCountByNumber")]
    async fn get_block_transaction_count_by_number(&self, number: BlockNumberOrTag) -> RpcResult<Option<U64>>;

    #[method(name = "getBlockTransactionCountByHash")]
    async fn get_block_transaction_count_by_hash(&self, hash: B256) -> RpcResult<Option<U64>>;

    #[method(name = "getTransactionByHash")]
    async fn get_transaction_by_hash(&self, hash: B256) -> RpcResult<Option<RpcTransaction>>;

    #[method(name = "getTransactionByBlockNumberAndIndex")]
    async fn get_transaction_by_block_number_and_index(
        &self,
        number: BlockNumberOrTag,
        index: U64,
    ) -> RpcResult<Option<RpcTransaction>>;

    #[method(name = "getTransactionByBlockHashAndIndex")]
    async fn get_transaction_by_block_hash_and_index(&self, hash: B256, index: U64)
        -> RpcResult<Option<RpcTransaction>>;

    #[method(name = "getTransactionReceipt")]
    async fn get_transaction_receipt(&self, hash: B256) -> RpcResult<Option<RpcReceipt>>;

    /// Logs of the canonical chain matching the filter, in block, transaction and log order
    #[method(name = "getLogs")]
    async fn get_logs(&self, filter: Filter) -> RpcResult<Vec<RpcLog>>;
}

/// Ethereum write rpc interface.
#[rpc(server, namespace = "eth")]
pub trait EthWriteRpcApi {
    /// Submits a signed transaction, returning its Ethereum hash
    #[method(name = "sendRawTransaction")]
    async fn send_raw_transaction(&self, transaction: Bytes) -> RpcResult<B256>;
}

#[rpc(server, namespace = "net")]
pub trait NetRpcApi {
    /// Chain id, as a decimal string
    #[method(name = "version")]
    fn version(&self) -> RpcResult<String>;
}

#[rpc(server, namespace = "web3")]
pub trait Web3RpcApi {
    #[method(name = "clientVersion")]
    fn client_version(&self) -> RpcResult<String>;
}
