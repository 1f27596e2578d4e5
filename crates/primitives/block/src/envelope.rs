//! Transport of signed Ethereum transactions through a native invoke.
//!
//! The native invoke carries the unsigned signing payload of the transaction in its calldata and the signature
//! in its signature field. [`decode_signed`] rebuilds the exact signed envelope from those two pieces, so the
//! synthetic hash computed at indexing time equals the hash returned at submission time.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEip2930, TxEnvelope, TxLegacy};
use alloy::eips::eip2930::AccessList;
use alloy::primitives::{Bytes, PrimitiveSignature, TxKind, U256};
use alloy::rlp::{Decodable, Header};
use ep_convert::{felt_to_u64, join_u256, split_u256, CodecError};
use serde::{Deserialize, Serialize};
use starknet_types_core::felt::Felt;

const LEGACY_V_OFFSET: u64 = 27;
const EIP155_V_OFFSET: u64 = 35;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Unsupported transaction type {0}")]
    UnsupportedType(u8),
    #[error("Invalid RLP: {0}")]
    Rlp(#[from] alloy::rlp::Error),
    #[error("Unexpected trailing bytes after the transaction payload")]
    TrailingBytes,
    #[error("Invalid signature v value {v} for chain id {chain_id:?}")]
    InvalidV { v: u64, chain_id: Option<u64> },
    #[error("Expected 5 signature felts, got {0}")]
    SignatureLength(usize),
    #[error("Invalid signature: {0}")]
    Signature(#[from] alloy::primitives::SignatureError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Signature in the layout expected by the execution contract. `v` is the EIP-155 value for legacy transactions
/// and the y-parity for typed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmSignature {
    pub r: U256,
    pub s: U256,
    pub v: u64,
    pub y_parity: bool,
}

impl EvmSignature {
    pub fn from_envelope(envelope: &TxEnvelope) -> Self {
        let signature = envelope.signature();
        let y_parity = signature.v();
        let v = match envelope {
            TxEnvelope::Legacy(signed) => legacy_v(y_parity, signed.tx().chain_id),
            _ => y_parity as u64,
        };
        Self { r: signature.r(), s: signature.s(), v, y_parity }
    }

    /// `[r.low, r.high, s.low, s.high, v]`
    pub fn to_felts(&self) -> Vec<Felt> {
        let mut felts = Vec::with_capacity(5);
        felts.extend_from_slice(&split_u256(self.r));
        felts.extend_from_slice(&split_u256(self.s));
        felts.push(Felt::from(self.v));
        felts
    }

    /// Inverse of [`EvmSignature::to_felts`]. The y-parity is resolved once the transaction type is known, see
    /// [`decode_signed`].
    fn from_felts(felts: &[Felt]) -> Result<(U256, U256, u64), EnvelopeError> {
        let [r_low, r_high, s_low, s_high, v] = felts else {
            return Err(EnvelopeError::SignatureLength(felts.len()));
        };
        Ok((join_u256(r_low, r_high)?, join_u256(s_low, s_high)?, felt_to_u64(v)?))
    }
}

fn legacy_v(y_parity: bool, chain_id: Option<u64>) -> u64 {
    match chain_id {
        Some(chain_id) => y_parity as u64 + EIP155_V_OFFSET + 2 * chain_id,
        None => y_parity as u64 + LEGACY_V_OFFSET,
    }
}

fn legacy_y_parity(v: u64, chain_id: Option<u64>) -> Result<bool, EnvelopeError> {
    let parity = match chain_id {
        Some(chain_id) => v.checked_sub(EIP155_V_OFFSET + 2 * chain_id),
        None => v.checked_sub(LEGACY_V_OFFSET),
    };
    match parity {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(EnvelopeError::InvalidV { v, chain_id }),
    }
}

/// Address of the account which signed the transaction.
pub fn recover_sender(envelope: &TxEnvelope) -> Result<alloy::primitives::Address, EnvelopeError> {
    Ok(envelope.recover_signer()?)
}

/// Unsigned signing payload of a transaction: `rlp(fields)` for legacy transactions, `type || rlp(fields)` for
/// typed ones.
pub fn signing_payload(envelope: &TxEnvelope) -> Result<Vec<u8>, EnvelopeError> {
    match envelope {
        TxEnvelope::Legacy(signed) => Ok(signed.tx().encoded_for_signing()),
        TxEnvelope::Eip2930(signed) => Ok(signed.tx().encoded_for_signing()),
        TxEnvelope::Eip1559(signed) => Ok(signed.tx().encoded_for_signing()),
        other => Err(EnvelopeError::UnsupportedType(u8::from(other.tx_type()))),
    }
}

/// Rebuilds the signed envelope from a signing payload and the signature felts of the native invoke.
pub fn decode_signed(payload: &[u8], signature: &[Felt]) -> Result<TxEnvelope, EnvelopeError> {
    let (r, s, v) = EvmSignature::from_felts(signature)?;
    let typed_parity = || match v {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(EnvelopeError::InvalidV { v, chain_id: None }),
    };

    let mut buf = payload;
    let envelope = match buf.first().copied() {
        Some(ty) if ty < 0x7f => {
            buf = &buf[1..];
            match ty {
                1 => {
                    let tx = decode_eip2930(&mut buf)?;
                    let sig = PrimitiveSignature::new(r, s, typed_parity()?);
                    TxEnvelope::Eip2930(tx.into_signed(sig))
                }
                2 => {
                    let tx = decode_eip1559(&mut buf)?;
                    let sig = PrimitiveSignature::new(r, s, typed_parity()?);
                    TxEnvelope::Eip1559(tx.into_signed(sig))
                }
                other => return Err(EnvelopeError::UnsupportedType(other)),
            }
        }
        _ => {
            let tx = decode_legacy(&mut buf)?;
            let sig = PrimitiveSignature::new(r, s, legacy_y_parity(v, tx.chain_id)?);
            TxEnvelope::Legacy(tx.into_signed(sig))
        }
    };

    if !buf.is_empty() {
        return Err(EnvelopeError::TrailingBytes);
    }
    Ok(envelope)
}

/// Decodes the list header and returns the list payload, advancing `buf` past the whole list.
fn list_payload<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], EnvelopeError> {
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(alloy::rlp::Error::UnexpectedString.into());
    }
    if buf.len() < header.payload_length {
        return Err(alloy::rlp::Error::InputTooShort.into());
    }
    let (payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;
    Ok(payload)
}

fn decode_legacy(buf: &mut &[u8]) -> Result<TxLegacy, EnvelopeError> {
    let mut fields = list_payload(buf)?;
    let fields = &mut fields;
    let mut tx = TxLegacy {
        chain_id: None,
        nonce: u64::decode(fields)?,
        gas_price: u128::decode(fields)?,
        gas_limit: u64::decode(fields)?,
        to: TxKind::decode(fields)?,
        value: U256::decode(fields)?,
        input: Bytes::decode(fields)?,
    };

    // EIP-155 signing payloads append `chain_id, 0, 0`.
    if !fields.is_empty() {
        tx.chain_id = Some(u64::decode(fields)?);
        if u64::decode(fields)? != 0 || u64::decode(fields)? != 0 {
            return Err(alloy::rlp::Error::Custom("non-zero EIP-155 placeholder").into());
        }
    }
    if !fields.is_empty() {
        return Err(EnvelopeError::TrailingBytes);
    }
    Ok(tx)
}

fn decode_eip2930(buf: &mut &[u8]) -> Result<TxEip2930, EnvelopeError> {
    let mut fields = list_payload(buf)?;
    let fields = &mut fields;
    let tx = TxEip2930 {
        chain_id: u64::decode(fields)?,
        nonce: u64::decode(fields)?,
        gas_price: u128::decode(fields)?,
        gas_limit: u64::decode(fields)?,
        to: TxKind::decode(fields)?,
        value: U256::decode(fields)?,
        input: Bytes::decode(fields)?,
        access_list: AccessList::decode(fields)?,
    };
    if !fields.is_empty() {
        return Err(EnvelopeError::TrailingBytes);
    }
    Ok(tx)
}

fn decode_eip1559(buf: &mut &[u8]) -> Result<TxEip1559, EnvelopeError> {
    let mut fields = list_payload(buf)?;
    let fields = &mut fields;
    let tx = TxEip1559 {
        chain_id: u64::decode(fields)?,
        nonce: u64::decode(fields)?,
        max_priority_fee_per_gas: u128::decode(fields)?,
        max_fee_per_gas: u128::decode(fields)?,
        gas_limit: u64::decode(fields)?,
        to: TxKind::decode(fields)?,
        value: U256::decode(fields)?,
        input: Bytes::decode(fields)?,
        access_list: AccessList::decode(fields)?,
    };
    if !fields.is_empty() {
        return Err(EnvelopeError::TrailingBytes);
    }
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::eips::eip2718::Encodable2718;
    use alloy::primitives::{address, bytes};
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::SignerSync;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn sign<T: SignableTransaction<PrimitiveSignature>>(tx: T) -> alloy::consensus::Signed<T> {
        let signer = PrivateKeySigner::random();
        let signature = signer.sign_hash_sync(&tx.signature_hash()).unwrap();
        tx.into_signed(signature)
    }

    fn legacy() -> TxEnvelope {
        TxEnvelope::Legacy(sign(TxLegacy {
            chain_id: Some(1_263_227_476),
            nonce: 3,
            gas_price: 1_000,
            gas_limit: 21_000,
            to: TxKind::Call(address!("00000000000000000000000000000000000000aa")),
            value: U256::from(7u8),
            input: bytes!("d09de08a"),
        }))
    }

    fn eip2930() -> TxEnvelope {
        TxEnvelope::Eip2930(sign(TxEip2930 {
            chain_id: 1_263_227_476,
            nonce: 0,
            gas_price: 10,
            gas_limit: 100_000,
            to: TxKind::Create,
            value: U256::ZERO,
            input: bytes!("6080604052"),
            access_list: AccessList::default(),
        }))
    }

    fn eip1559() -> TxEnvelope {
        TxEnvelope::Eip1559(sign(TxEip1559 {
            chain_id: 1_263_227_476,
            nonce: 42,
            gas_limit: 1_000_000,
            max_fee_per_gas: 2_000,
            max_priority_fee_per_gas: 100,
            to: TxKind::Call(address!("00000000000000000000000000000000000000bb")),
            value: U256::from(1_000_000_000u64),
            input: Bytes::new(),
            access_list: AccessList::default(),
        }))
    }

    #[rstest]
    #[case::legacy(legacy())]
    #[case::eip2930(eip2930())]
    #[case::eip1559(eip1559())]
    fn test_rebuild_signed_envelope(#[case] envelope: TxEnvelope) {
        let payload = signing_payload(&envelope).unwrap();
        let signature = EvmSignature::from_envelope(&envelope).to_felts();

        let rebuilt = decode_signed(&payload, &signature).unwrap();
        assert_eq!(rebuilt.tx_hash(), envelope.tx_hash());
        assert_eq!(rebuilt.encoded_2718(), envelope.encoded_2718());
        assert_eq!(rebuilt.recover_signer().unwrap(), envelope.recover_signer().unwrap());
    }

    #[test]
    fn test_legacy_v_is_eip155() {
        let envelope = legacy();
        let signature = EvmSignature::from_envelope(&envelope);
        assert!(signature.v == 2 * 1_263_227_476 + 35 || signature.v == 2 * 1_263_227_476 + 36);
    }

    #[test]
    fn test_rejects_bad_parity() {
        let envelope = eip1559();
        let payload = signing_payload(&envelope).unwrap();
        let mut signature = EvmSignature::from_envelope(&envelope).to_felts();
        signature[4] = Felt::from(2u8);
        assert_matches!(decode_signed(&payload, &signature), Err(EnvelopeError::InvalidV { v: 2, .. }));
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let envelope = eip1559();
        let payload = signing_payload(&envelope).unwrap();
        let signature = EvmSignature::from_envelope(&envelope).to_felts();
        assert_matches!(decode_signed(&payload[..payload.len() - 1], &signature), Err(EnvelopeError::Rlp(_)));
    }

    #[test]
    fn test_rejects_short_signature() {
        let payload = signing_payload(&legacy()).unwrap();
        assert_matches!(decode_signed(&payload, &[Felt::ONE]), Err(EnvelopeError::SignatureLength(1)));
    }
}
