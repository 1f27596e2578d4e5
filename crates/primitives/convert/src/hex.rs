//! Ethereum JSON-RPC hex encodings.
//!
//! - Quantities are `0x`-prefixed, lower-case, without leading zeros. Zero is `0x0`.
//! - Data is `0x`-prefixed with two hex digits per byte. Data is always encoded lower-case, but mixed case is
//!   accepted on input since checksummed addresses are data.

use crate::{CodecError, CodecResult};
use alloy::primitives::U256;

pub fn encode_quantity(value: U256) -> String {
    if value.is_zero() {
        "0x0".to_string()
    } else {
        format!("0x{value:x}")
    }
}

pub fn encode_u64(value: u64) -> String {
    format!("{value:#x}")
}

pub fn encode_data(bytes: impl AsRef<[u8]>) -> String {
    alloy::hex::encode_prefixed(bytes)
}

fn strip_prefix(s: &str) -> CodecResult<&str> {
    s.strip_prefix("0x").ok_or(CodecError::MissingPrefix)
}

fn hex_error(err: alloy::hex::FromHexError) -> CodecError {
    match err {
        alloy::hex::FromHexError::InvalidHexCharacter { c, .. } => CodecError::InvalidHexDigit(c),
        _ => CodecError::OddLength,
    }
}

/// Decodes a canonical quantity into a 256-bit word.
pub fn decode_quantity(s: &str) -> CodecResult<U256> {
    let digits = strip_prefix(s)?;
    if digits.is_empty() {
        return Err(CodecError::EmptyQuantity);
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(CodecError::LeadingZeros);
    }
    if digits.len() > 64 {
        return Err(CodecError::out_of_range(s, "u256"));
    }
    if digits.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(CodecError::NotLowerCase);
    }

    let bytes = if digits.len() % 2 == 0 {
        alloy::hex::decode(s)
    } else {
        alloy::hex::decode(format!("0x0{digits}"))
    }
    .map_err(hex_error)?;
    Ok(U256::from_be_slice(&bytes))
}

pub fn decode_u64(s: &str) -> CodecResult<u64> {
    let value = decode_quantity(s)?;
    u64::try_from(value).map_err(|_| CodecError::out_of_range(s, "u64"))
}

pub fn decode_data(s: &str) -> CodecResult<Vec<u8>> {
    let digits = strip_prefix(s)?;
    if digits.len() % 2 != 0 {
        return Err(CodecError::OddLength);
    }
    // the prefix is stripped once more by the decoder, a second `0x` is rejected as a digit
    alloy::hex::decode(s).map_err(hex_error)
}

/// Decodes data of a fixed size, such as a 32-byte hash or a 20-byte address.
pub fn decode_fixed<const N: usize>(s: &str) -> CodecResult<[u8; N]> {
    let bytes = decode_data(s)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| CodecError::InvalidLength { expected: N, actual })
}
