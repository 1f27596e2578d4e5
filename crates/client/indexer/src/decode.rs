//! Decoding of native blocks into canonical bundles.
//!
//! Only invokes whose calldata forwards a payload to `eth_send_transaction` on the execution contract are
//! Ethereum transactions. Everything else in the block is skipped. Once the calldata selector matched, every
//! further mismatch is a [`DecodeError`]: the block is never partially indexed.

use ec_native_client::{ExecutionStatus, NativeBlock, NativeBlockHeader, NativeReceipt, TransactionWithReceipt};
use ep_block::envelope::{decode_signed, recover_sender, EnvelopeError};
use ep_block::execution::{
    decode_execute_calldata, native_hash_to_b256, EvmLogEvent, ExecutionLayoutError, TransactionExecutedEvent,
    EVM_LOG_EVENT, TRANSACTION_EXECUTED_EVENT,
};
use ep_block::{Address, BlockBundle, BlockHeader, Bytes, ExecutedTransaction, LogEntry, Transaction};
use ep_convert::{felt_to_b256, felt_to_u256, AddressMapping, GasScale};
use starknet_types_core::felt::Felt;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Transaction {transaction:#x}: invalid execute calldata: {source}")]
    Calldata { transaction: Felt, source: ExecutionLayoutError },
    #[error("Transaction {transaction:#x}: invalid signed payload: {source}")]
    Envelope { transaction: Felt, source: EnvelopeError },
    #[error("Transaction {transaction:#x}: recovered sender {sender} does not map to native sender {native_sender:#x}")]
    SenderMismatch { transaction: Felt, sender: Address, native_sender: Felt },
    #[error("Transaction {transaction:#x}: malformed {event} event: {source}")]
    Event { transaction: Felt, event: &'static str, source: ExecutionLayoutError },
    #[error("Transaction {transaction:#x}: expected exactly one transaction_executed event, found {count}")]
    ExecutedEvents { transaction: Felt, count: usize },
}

/// Chain parameters needed to decode blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub mapping: AddressMapping,
    pub gas_scale: GasScale,
    pub block_gas_limit: u64,
}

#[derive(Debug, Clone)]
pub struct BlockDecoder {
    config: DecoderConfig,
}

impl BlockDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn decode_block(&self, block: &NativeBlock) -> Result<BlockBundle, DecodeError> {
        let header = self.header(&block.header);
        let mut executed = Vec::new();
        for tx in &block.transactions {
            if let Some(tx) = self.decode_transaction(tx)? {
                executed.push(tx);
            }
        }
        Ok(BlockBundle::assemble(header, self.config.gas_scale, executed))
    }

    pub fn header(&self, header: &NativeBlockHeader) -> BlockHeader {
        let sequencer = felt_to_b256(&header.sequencer_address);
        BlockHeader {
            number: header.block_number,
            hash: native_hash_to_b256(&header.block_hash),
            parent_hash: native_hash_to_b256(&header.parent_hash),
            timestamp: header.timestamp,
            // low 20 bytes of the sequencer address
            miner: Address::from_slice(&sequencer[12..]),
            gas_limit: self.config.block_gas_limit,
            base_fee_per_gas: self.config.gas_scale.to_evm_gas_price(felt_to_u256(&header.l1_gas_price.price_in_wei)),
        }
    }

    /// Returns [`None`] for native transactions which do not carry an Ethereum transaction.
    pub fn decode_transaction(
        &self,
        tx: &TransactionWithReceipt,
    ) -> Result<Option<ExecutedTransaction>, DecodeError> {
        let TransactionWithReceipt { transaction: native, receipt } = tx;
        let native_hash = receipt.transaction_hash;
        if !native.is_invoke() {
            return Ok(None);
        }
        let Some(native_sender) = native.sender_address else {
            return Ok(None);
        };
        let payload = match decode_execute_calldata(self.config.mapping.execution_contract(), &native.calldata) {
            None => return Ok(None),
            Some(payload) => {
                payload.map_err(|source| DecodeError::Calldata { transaction: native_hash, source })?
            }
        };

        let envelope = decode_signed(&payload, &native.signature)
            .map_err(|source| DecodeError::Envelope { transaction: native_hash, source })?;
        let sender =
            recover_sender(&envelope).map_err(|source| DecodeError::Envelope { transaction: native_hash, source })?;
        if !self.config.mapping.is_mapping_of(sender, native_sender) {
            return Err(DecodeError::SenderMismatch { transaction: native_hash, sender, native_sender });
        }
        let transaction = Transaction::from_envelope(&envelope, sender, native_hash);

        if receipt.execution_status == ExecutionStatus::Reverted {
            tracing::debug!(
                "Transaction {} reverted natively: {}",
                transaction.hash,
                receipt.revert_reason.as_deref().unwrap_or("no reason")
            );
            return Ok(Some(ExecutedTransaction {
                transaction,
                success: false,
                native_gas_used: 0,
                contract_address: None,
                return_data: Bytes::new(),
                logs: vec![],
            }));
        }

        let (executed, logs) = self.decode_events(receipt)?;
        Ok(Some(ExecutedTransaction {
            transaction,
            success: executed.outcome.success,
            native_gas_used: executed.outcome.native_gas_used,
            contract_address: executed.created_address,
            return_data: executed.outcome.return_data.into(),
            logs,
        }))
    }

    fn decode_events(&self, receipt: &NativeReceipt) -> Result<(TransactionExecutedEvent, Vec<LogEntry>), DecodeError> {
        let transaction = receipt.transaction_hash;
        let mut executed = Vec::with_capacity(1);
        let mut logs = Vec::new();

        for event in &receipt.events {
            if event.from_address != self.config.mapping.execution_contract() {
                continue;
            }
            match event.keys.first() {
                Some(selector) if selector == &*EVM_LOG_EVENT => {
                    let log = EvmLogEvent::parse(&event.keys, &event.data).map_err(|source| DecodeError::Event {
                        transaction,
                        event: "evm_log",
                        source,
                    })?;
                    logs.push(LogEntry { address: log.address, topics: log.topics, data: log.data.into() });
                }
                Some(selector) if selector == &*TRANSACTION_EXECUTED_EVENT => {
                    let event = TransactionExecutedEvent::parse(&event.keys, &event.data).map_err(|source| {
                        DecodeError::Event { transaction, event: "transaction_executed", source }
                    })?;
                    executed.push(event);
                }
                _ => {}
            }
        }

        match <[_; 1]>::try_from(executed) {
            Ok([executed]) => Ok((executed, logs)),
            Err(executed) => Err(DecodeError::ExecutedEvents { transaction, count: executed.len() }),
        }
    }
}
