//! Canonical Ethereum-shaped chain data, as materialized by the indexer and served by the adapter.
//!
//! The types in the crate root are the storage representation. [`rpc`] holds the Ethereum JSON-RPC wire views
//! and request types, and [`execution`] the calldata and event layout of the native execution contract.

mod block;
mod bundle;
pub mod envelope;
pub mod execution;
mod filter;
mod receipt;
pub mod rpc;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod transaction;

pub use block::*;
pub use bundle::*;
pub use filter::*;
pub use receipt::*;
pub use transaction::*;

pub use alloy::primitives::{Address, Bloom, Bytes, B256, U256};
pub use starknet_types_core::felt::Felt;
