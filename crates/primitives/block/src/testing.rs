//! Builders for canonical test data.
//!
//! Hashes are derived from small integers so that forks are easy to tell apart: `hash(n, fork)` is the hash of
//! block `n` on fork `fork`.

use crate::envelope::EvmSignature;
use crate::{BlockBundle, BlockHeader, ExecutedTransaction, LogEntry, Transaction};
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, PrimitiveSignature, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use ep_convert::GasScale;
use starknet_types_core::felt::Felt;

pub fn header(number: u64, hash: u8, parent: u8) -> BlockHeader {
    BlockHeader {
        number,
        hash: B256::with_last_byte(hash),
        parent_hash: B256::with_last_byte(parent),
        timestamp: 1_700_000_000 + number,
        miner: Address::ZERO,
        gas_limit: 30_000_000,
        base_fee_per_gas: U256::from(10u8),
    }
}

pub fn executed(hash: u8, logs: usize) -> ExecutedTransaction {
    ExecutedTransaction {
        transaction: transaction(B256::with_last_byte(hash), Felt::from(hash)),
        success: true,
        native_gas_used: 50,
        contract_address: None,
        return_data: Bytes::new(),
        logs: (0..logs)
            .map(|i| LogEntry {
                address: Address::with_last_byte(2),
                topics: vec![B256::with_last_byte(i as u8)],
                data: Bytes::new(),
            })
            .collect(),
    }
}

pub fn transaction(hash: B256, native_hash: Felt) -> Transaction {
    Transaction {
        hash,
        native_hash,
        block_hash: B256::ZERO,
        block_number: 0,
        transaction_index: 0,
        tx_type: 2,
        chain_id: Some(1),
        nonce: 0,
        from: Address::with_last_byte(1),
        to: Some(Address::with_last_byte(2)),
        value: U256::ZERO,
        gas_limit: 100_000,
        gas_price: None,
        max_fee_per_gas: Some(U256::from(100u8)),
        max_priority_fee_per_gas: Some(U256::from(1u8)),
        input: Bytes::new(),
        access_list: None,
        signature: EvmSignature { r: U256::from(1u8), s: U256::from(2u8), v: 0, y_parity: false },
    }
}

/// Hash of block `number` on fork `fork`. Block `0` is shared by all forks.
pub fn hash(number: u64, fork: u8) -> B256 {
    let mut bytes = [0u8; 32];
    if number > 0 {
        bytes[0] = fork;
    }
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    B256::from(bytes)
}

/// Transaction hash for position `index` of block `number` on fork `fork`.
pub fn tx_hash(number: u64, fork: u8, index: u8) -> B256 {
    let mut bytes = hash(number, fork).0;
    bytes[1] = 0xee;
    bytes[2] = index;
    B256::from(bytes)
}

/// Block `number` on fork `fork`, linked to `hash(number - 1, parent_fork)`, with one transaction carrying
/// `logs` logs.
pub fn fork_bundle(number: u64, fork: u8, parent_fork: u8, logs: usize) -> BlockBundle {
    let header = BlockHeader {
        number,
        hash: hash(number, fork),
        parent_hash: if number == 0 { B256::ZERO } else { hash(number - 1, parent_fork) },
        timestamp: 1_700_000_000 + number,
        miner: Address::ZERO,
        gas_limit: 30_000_000,
        base_fee_per_gas: U256::from(10u8),
    };
    let mut executed = executed(0, logs);
    let tx_hash = tx_hash(number, fork, 0);
    executed.transaction.hash = tx_hash;
    executed.transaction.native_hash = Felt::from_bytes_be(&tx_hash.0);
    for (i, log) in executed.logs.iter_mut().enumerate() {
        log.topics = vec![B256::with_last_byte(i as u8), hash(number, fork)];
    }
    BlockBundle::assemble(header, GasScale::V1, vec![executed])
}

/// Block `number` of the linear chain `fork`.
pub fn bundle(number: u64, fork: u8) -> BlockBundle {
    fork_bundle(number, fork, fork, 1)
}

fn sign<T: SignableTransaction<PrimitiveSignature>>(signer: &PrivateKeySigner, tx: T) -> alloy::consensus::Signed<T> {
    let signature = signer.sign_hash_sync(&tx.signature_hash()).expect("Signing a transaction hash");
    tx.into_signed(signature)
}

pub fn sign_eip1559(signer: &PrivateKeySigner, tx: TxEip1559) -> TxEnvelope {
    TxEnvelope::Eip1559(sign(signer, tx))
}

pub fn sign_legacy(signer: &PrivateKeySigner, tx: TxLegacy) -> TxEnvelope {
    TxEnvelope::Legacy(sign(signer, tx))
}

/// EIP-2718 encoding of a signed transaction, as sent to `eth_sendRawTransaction`.
pub fn raw_transaction(envelope: &TxEnvelope) -> Bytes {
    envelope.encoded_2718().into()
}
