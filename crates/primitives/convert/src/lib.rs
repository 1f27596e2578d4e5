//! Conversions between the Ethereum value domain (20-byte addresses, 256-bit words, hex quantities) and the
//! Starknet field element domain.
//!
//! Everything in this crate is a pure function. Conversions that can lose information never approximate:
//! they fail with [`CodecError::ValueOutOfRange`] instead.

mod address;
mod error;
mod felt;
mod gas;
pub mod hex;
pub mod hex_serde;

pub use address::*;
pub use error::*;
pub use felt::*;
pub use gas::*;

pub use alloy::primitives::{Address, B256, U256};
pub use starknet_types_core::felt::Felt;

