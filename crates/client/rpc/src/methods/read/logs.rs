use ep_block::rpc::{Filter, RpcLog};

use crate::{Eth, EthRpcResult};

/// Returns the canonical logs matching `filter`.
///
/// Either `blockHash` or a `fromBlock`..=`toBlock` range selects the blocks, both bounds defaulting to `latest`.
/// Within those blocks a log matches when its address is one of `address` (if set) and every non-null position
/// of `topics` contains the log's topic at that position.
///
/// # Errors
///
/// - `InvalidBlockRange` if `toBlock` is before `fromBlock`, the range spans too many blocks, or `blockHash` is
///   combined with a range.
pub async fn get_logs(eth: &Eth, filter: Filter) -> EthRpcResult<Vec<RpcLog>> {
    let logs = eth.adapter.get_logs(filter).await?;
    tracing::trace!("eth_getLogs matched {} logs", logs.len());
    Ok(logs)
}
