use crate::{logs_bloom, Block, BlockHeader, Log, Receipt, Transaction};
use alloy::primitives::{Address, Bloom, Bytes, B256};
use ep_convert::GasScale;
use serde::{Deserialize, Serialize};

/// A log as emitted during execution, before it is placed in a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// A decoded transaction together with its execution outcome, before it is placed in a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedTransaction {
    pub transaction: Transaction,
    pub success: bool,
    pub native_gas_used: u64,
    pub contract_address: Option<Address>,
    pub return_data: Bytes,
    pub logs: Vec<LogEntry>,
}

/// Everything committed for one block: the unit of atomic replacement in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBundle {
    pub block: Block,
    pub transactions: Vec<Transaction>,
    pub receipts: Vec<Receipt>,
}

impl BlockBundle {
    /// Places executed transactions in a block, assigning block positions, cumulative gas, and block-level log
    /// indices in execution order.
    pub fn assemble(header: BlockHeader, gas_scale: GasScale, executed: Vec<ExecutedTransaction>) -> Self {
        let mut transactions = Vec::with_capacity(executed.len());
        let mut receipts = Vec::with_capacity(executed.len());
        let mut cumulative_gas_used = 0u64;
        let mut next_log_index = 0u64;

        for (index, executed) in executed.into_iter().enumerate() {
            let mut transaction = executed.transaction;
            transaction.block_hash = header.hash;
            transaction.block_number = header.number;
            transaction.transaction_index = index as u64;

            let gas_used = gas_scale.to_evm_gas(executed.native_gas_used);
            cumulative_gas_used = cumulative_gas_used.saturating_add(gas_used);

            let logs: Vec<Log> = executed
                .logs
                .into_iter()
                .enumerate()
                .map(|(transaction_log_index, entry)| {
                    let log = Log {
                        address: entry.address,
                        topics: entry.topics,
                        data: entry.data,
                        block_hash: header.hash,
                        block_number: header.number,
                        transaction_hash: transaction.hash,
                        transaction_index: transaction.transaction_index,
                        log_index: next_log_index,
                        transaction_log_index: transaction_log_index as u64,
                    };
                    next_log_index += 1;
                    log
                })
                .collect();

            receipts.push(Receipt {
                transaction_hash: transaction.hash,
                block_hash: header.hash,
                block_number: header.number,
                transaction_index: transaction.transaction_index,
                tx_type: transaction.tx_type,
                from: transaction.from,
                to: transaction.to,
                status: executed.success,
                gas_used,
                cumulative_gas_used,
                effective_gas_price: transaction.effective_gas_price(header.base_fee_per_gas),
                contract_address: executed.contract_address,
                logs_bloom: logs_bloom(&logs),
                logs,
                gas_scale_version: gas_scale.version,
                return_data: executed.return_data,
            });
            transactions.push(transaction);
        }

        let mut bloom = Bloom::ZERO;
        for receipt in &receipts {
            bloom.accrue_bloom(&receipt.logs_bloom);
        }

        let block = Block {
            header,
            gas_used: cumulative_gas_used,
            logs_bloom: bloom,
            transactions: transactions.iter().map(|tx| tx.hash).collect(),
        };

        Self { block, transactions, receipts }
    }

    pub fn number(&self) -> u64 {
        self.block.number()
    }

    pub fn hash(&self) -> B256 {
        self.block.hash()
    }

    pub fn logs(&self) -> impl Iterator<Item = &Log> {
        self.receipts.iter().flat_map(|receipt| receipt.logs.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{executed, header};
    use alloy::primitives::U256;

    #[test]
    fn test_assemble_positions() {
        let scale = GasScale::new(2, 10, 1).unwrap();
        let bundle = BlockBundle::assemble(header(5, 0x55, 0x44), scale, vec![executed(1, 2), executed(2, 1)]);

        assert_eq!(bundle.block.transactions, vec![B256::with_last_byte(1), B256::with_last_byte(2)]);
        assert_eq!(bundle.block.gas_used, 1_000);
        assert_eq!(bundle.transactions[1].transaction_index, 1);
        assert_eq!(bundle.transactions[1].block_hash, B256::with_last_byte(0x55));

        let receipt = &bundle.receipts[1];
        assert_eq!(receipt.gas_used, 500);
        assert_eq!(receipt.cumulative_gas_used, 1_000);
        assert_eq!(receipt.gas_scale_version, 2);
        assert_eq!(receipt.effective_gas_price, U256::from(11u8));

        let indices: Vec<_> = bundle.logs().map(|log| (log.log_index, log.transaction_log_index)).collect();
        assert_eq!(indices, vec![(0, 0), (1, 1), (2, 0)]);
        assert_eq!(bundle.logs().last().unwrap().transaction_hash, B256::with_last_byte(2));
    }

    #[test]
    fn test_assemble_bloom() {
        let bundle = BlockBundle::assemble(header(1, 1, 0), GasScale::V1, vec![executed(1, 1)]);
        let log = &bundle.receipts[0].logs[0];
        assert!(bundle.block.logs_bloom.contains_raw_log(log.address, &log.topics));
        assert_eq!(bundle.block.logs_bloom, bundle.receipts[0].logs_bloom);
    }
}
