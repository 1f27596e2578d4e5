use ep_block::{Bytes, B256};

use crate::{Eth, EthRpcApiError, EthRpcResult};

/// Submits a signed Ethereum transaction to the native chain.
///
/// The returned hash is the Ethereum transaction hash. The transaction becomes visible to the historical
/// methods only once the block including it has been indexed.
///
/// # Errors
///
/// - `InvalidParams` if the payload is empty, cannot be decoded, is signed for another chain or is rejected by
///   the native chain.
pub async fn send_raw_transaction(eth: &Eth, transaction: Bytes) -> EthRpcResult<B256> {
    if transaction.is_empty() {
        return Err(EthRpcApiError::InvalidParams("Empty transaction".to_string()));
    }
    let hash = eth.adapter.send_raw_transaction(transaction).await?;
    tracing::debug!("📨 Accepted transaction {hash}");
    Ok(hash)
}
