//! Client for the native chain's JSON-RPC.
//!
//! [`NativeClient`] is the seam between Ethane and the rollup: the adapter reads live state and submits invokes
//! through it, and the indexer pulls blocks from it. [`JsonRpcNativeClient`] is the production implementation,
//! with per-call timeouts and bounded retries of transient failures.

use async_trait::async_trait;
use ep_block::execution::BALANCE_OF;
use ep_convert::{join_u256, U256};
use starknet_types_core::felt::Felt;

mod client;
mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod types;

pub use client::{JsonRpcNativeClient, NativeClientConfig};
pub use error::*;
pub use types::*;

#[async_trait]
pub trait NativeClient: Send + Sync {
    async fn chain_id(&self) -> NativeResult<Felt>;

    async fn block_hash_and_number(&self) -> NativeResult<BlockHashAndNumber>;

    async fn get_nonce(&self, block_id: BlockId, contract_address: Felt) -> NativeResult<Felt>;

    /// [`None`] when no contract is deployed at this address.
    async fn get_class_hash_at(&self, block_id: BlockId, contract_address: Felt) -> NativeResult<Option<Felt>>;

    async fn call(&self, request: FunctionCall, block_id: BlockId) -> NativeResult<Vec<Felt>>;

    /// Simulates `transaction` without validating its signature.
    async fn estimate_fee(&self, transaction: BroadcastedInvokeV1, block_id: BlockId) -> NativeResult<FeeEstimate>;

    /// Submits an invoke. This is attempted at most once.
    async fn add_invoke_transaction(&self, transaction: BroadcastedInvokeV1) -> NativeResult<Felt>;

    /// [`None`] when the node does not know this transaction, for instance because it was dropped.
    async fn get_transaction_status(&self, transaction_hash: Felt) -> NativeResult<Option<TransactionStatus>>;

    /// [`None`] when the block does not exist yet.
    async fn get_block_with_tx_hashes(&self, block_id: BlockId) -> NativeResult<Option<BlockWithTxHashes>>;

    /// [`None`] when the block does not exist yet.
    async fn get_block_with_receipts(&self, block_id: BlockId) -> NativeResult<Option<NativeBlock>>;

    /// Balance of `account` in the ERC20 `token`.
    async fn get_balance(&self, token: Felt, account: Felt, block_id: BlockId) -> NativeResult<U256> {
        let request = FunctionCall {
            contract_address: token,
            entry_point_selector: *BALANCE_OF,
            calldata: vec![account],
        };
        match self.call(request, block_id).await?.as_slice() {
            [low, high, ..] => join_u256(low, high).map_err(|err| NativeClientError::Deserialize(err.to_string())),
            other => Err(NativeClientError::Deserialize(format!("balanceOf returned {} felts", other.len()))),
        }
    }
}
