//! Historical queries, served from the canonical store only.

use crate::{EthAdapter, ExecError, ExecResult};
use ep_block::rpc::{BlockNumberOrTag, Filter, RpcBlock, RpcLog, RpcReceipt, RpcTransaction};
use ep_block::{Block, LogFilter, Transaction, B256};

/// Resolves a block tag against the store head. Tags other than `earliest` are [`None`] on an empty store.
fn resolve_tag(tag: BlockNumberOrTag, head: Option<u64>) -> Option<u64> {
    match tag {
        BlockNumberOrTag::Number(number) => Some(number),
        BlockNumberOrTag::Earliest => Some(0),
        BlockNumberOrTag::Latest
        | BlockNumberOrTag::Pending
        | BlockNumberOrTag::Safe
        | BlockNumberOrTag::Finalized => head,
    }
}

impl EthAdapter {
    async fn head_number(&self) -> ExecResult<Option<u64>> {
        Ok(self.store.head().await?.map(|head| head.number))
    }

    async fn block_by_tag(&self, tag: BlockNumberOrTag) -> ExecResult<Option<Block>> {
        let head = match tag {
            BlockNumberOrTag::Number(_) | BlockNumberOrTag::Earliest => None,
            _ => self.head_number().await?,
        };
        match resolve_tag(tag, head) {
            Some(number) => Ok(self.store.block_by_number(number).await?),
            None => Ok(None),
        }
    }

    async fn rpc_block(&self, block: Option<Block>, full: bool) -> ExecResult<Option<RpcBlock>> {
        let Some(block) = block else {
            return Ok(None);
        };
        if full {
            let transactions = self.store.block_transactions(&block).await?;
            Ok(Some(RpcBlock::from_canonical(&block, Some(&transactions))))
        } else {
            Ok(Some(RpcBlock::from_canonical(&block, None)))
        }
    }

    async fn rpc_transaction(&self, transaction: Option<Transaction>) -> ExecResult<Option<RpcTransaction>> {
        let Some(transaction) = transaction else {
            return Ok(None);
        };
        // the block may have been superseded since the transaction was read
        let Some(block) = self.store.block_by_hash(transaction.block_hash).await? else {
            return Ok(None);
        };
        Ok(Some(RpcTransaction::from_canonical(&transaction, block.header.base_fee_per_gas)))
    }

    async fn transaction_at(&self, block: Option<Block>, index: u64) -> ExecResult<Option<RpcTransaction>> {
        let Some(block) = block else {
            return Ok(None);
        };
        let Some(hash) = block.transactions.get(index as usize) else {
            return Ok(None);
        };
        let transaction = self.store.transaction(*hash).await?;
        self.rpc_transaction(transaction).await
    }

    /// `eth_getBlockByNumber`.
    pub async fn get_block_by_number(&self, number: BlockNumberOrTag, full: bool) -> ExecResult<Option<RpcBlock>> {
        let block = self.block_by_tag(number).await?;
        self.rpc_block(block, full).await
    }

    /// `eth_getBlockByHash`.
    pub async fn get_block_by_hash(&self, hash: B256, full: bool) -> ExecResult<Option<RpcBlock>> {
        let block = self.store.block_by_hash(hash).await?;
        self.rpc_block(block, full).await
    }

    pub async fn get_block_transaction_count_by_number(&self, number: BlockNumberOrTag) -> ExecResult<Option<u64>> {
        Ok(self.block_by_tag(number).await?.map(|block| block.transactions.len() as u64))
    }

    pub async fn get_block_transaction_count_by_hash(&self, hash: B256) -> ExecResult<Option<u64>> {
        Ok(self.store.block_by_hash(hash).await?.map(|block| block.transactions.len() as u64))
    }

    /// `eth_getTransactionByHash`. Transactions only appear once indexed, there is no pending pool.
    pub async fn get_transaction_by_hash(&self, hash: B256) -> ExecResult<Option<RpcTransaction>> {
        let transaction = self.store.transaction(hash).await?;
        self.rpc_transaction(transaction).await
    }

    pub async fn get_transaction_by_block_number_and_index(
        &self,
        number: BlockNumberOrTag,
        index: u64,
    ) -> ExecResult<Option<RpcTransaction>> {
        let block = self.block_by_tag(number).await?;
        self.transaction_at(block, index).await
    }

    pub async fn get_transaction_by_block_hash_and_index(
        &self,
        hash: B256,
        index: u64,
    ) -> ExecResult<Option<RpcTransaction>> {
        let block = self.store.block_by_hash(hash).await?;
        self.transaction_at(block, index).await
    }

    /// `eth_getTransactionReceipt`.
    pub async fn get_transaction_receipt(&self, hash: B256) -> ExecResult<Option<RpcReceipt>> {
        Ok(self.store.receipt(hash).await?.as_ref().map(RpcReceipt::from))
    }

    /// `eth_getLogs`.
    ///
    /// A range is inclusive on both ends and may not span more than `max_logs_block_range` blocks once clamped to
    /// the head. Missing bounds default to `latest`.
    pub async fn get_logs(&self, filter: Filter) -> ExecResult<Vec<RpcLog>> {
        let (from_block, to_block) = match filter.block_hash {
            Some(hash) => {
                if filter.from_block.is_some() || filter.to_block.is_some() {
                    return Err(ExecError::InvalidBlockRange(
                        "blockHash cannot be combined with fromBlock or toBlock".to_string(),
                    ));
                }
                let block = self.store.block_by_hash(hash).await?.ok_or(ExecError::ResourceNotFound("block"))?;
                (block.number(), block.number())
            }
            None => {
                let head = self.head_number().await?;
                let from = resolve_tag(filter.from_block.unwrap_or_default(), head);
                let to = resolve_tag(filter.to_block.unwrap_or_default(), head);
                if let (Some(from), Some(to)) = (from, to) {
                    if to < from {
                        return Err(ExecError::InvalidBlockRange(format!("toBlock {to} is before fromBlock {from}")));
                    }
                }

                let Some(head) = head else {
                    return Ok(vec![]);
                };
                let (from, to) = (from.unwrap_or(head), to.unwrap_or(head).min(head));
                if from > to {
                    return Ok(vec![]);
                }
                let max = self.config.max_logs_block_range;
                if to - from >= max {
                    return Err(ExecError::InvalidBlockRange(format!(
                        "Range [{from}, {to}] spans more than {max} blocks"
                    )));
                }
                (from, to)
            }
        };

        let log_filter = LogFilter {
            from_block,
            to_block,
            addresses: filter.address.map(|address| address.into_vec()).unwrap_or_default(),
            topics: filter
                .topics
                .unwrap_or_default()
                .into_iter()
                .map(|position| position.map(|topics| topics.into_vec()).unwrap_or_default())
                .collect(),
        };
        let logs = self.store.logs(&log_filter).await?;
        Ok(logs.iter().map(RpcLog::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::number(BlockNumberOrTag::Number(7), Some(3), Some(7))]
    #[case::earliest(BlockNumberOrTag::Earliest, None, Some(0))]
    #[case::latest(BlockNumberOrTag::Latest, Some(3), Some(3))]
    #[case::pending(BlockNumberOrTag::Pending, Some(3), Some(3))]
    #[case::latest_empty(BlockNumberOrTag::Latest, None, None)]
    fn test_resolve_tag(#[case] tag: BlockNumberOrTag, #[case] head: Option<u64>, #[case] expected: Option<u64>) {
        assert_eq!(resolve_tag(tag, head), expected);
    }
}
