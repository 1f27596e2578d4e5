use crate::envelope::EvmSignature;
use alloy::consensus::{Transaction as _, TxEnvelope};
use alloy::eips::eip2930::AccessList;
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use starknet_types_core::felt::Felt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Synthetic hash: keccak-256 of the EIP-2718 encoding of the signed transaction.
    pub hash: B256,
    /// Hash of the native invoke transaction carrying this transaction.
    pub native_hash: Felt,
    pub block_hash: B256,
    pub block_number: u64,
    pub transaction_index: u64,
    pub tx_type: u8,
    pub chain_id: Option<u64>,
    pub nonce: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub input: Bytes,
    pub access_list: Option<AccessList>,
    pub signature: EvmSignature,
}

impl Transaction {
    /// Builds the canonical transaction from a signed envelope. Block position fields are left zeroed and are
    /// filled in when the transaction is placed in a block.
    pub fn from_envelope(envelope: &TxEnvelope, from: Address, native_hash: Felt) -> Self {
        let (gas_price, max_fee_per_gas, max_priority_fee_per_gas) = match envelope.max_priority_fee_per_gas() {
            Some(priority) => (None, Some(U256::from(envelope.max_fee_per_gas())), Some(U256::from(priority))),
            None => (envelope.gas_price().map(U256::from), None, None),
        };

        Self {
            hash: *envelope.tx_hash(),
            native_hash,
            block_hash: B256::ZERO,
            block_number: 0,
            transaction_index: 0,
            tx_type: u8::from(envelope.tx_type()),
            chain_id: envelope.chain_id(),
            nonce: envelope.nonce(),
            from,
            to: envelope.to(),
            value: envelope.value(),
            gas_limit: envelope.gas_limit(),
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            input: envelope.input().clone(),
            access_list: envelope.access_list().cloned(),
            signature: EvmSignature::from_envelope(envelope),
        }
    }

    /// Gas price actually paid, given the block's base fee.
    pub fn effective_gas_price(&self, base_fee: U256) -> U256 {
        match (self.gas_price, self.max_fee_per_gas, self.max_priority_fee_per_gas) {
            (Some(gas_price), _, _) => gas_price,
            (None, Some(max_fee), Some(priority)) => max_fee.min(base_fee.saturating_add(priority)),
            (None, Some(max_fee), None) => max_fee,
            (None, None, _) => base_fee,
        }
    }
}
