use ep_convert::{AddressMapping, GasScale};
use serde::{Deserialize, Serialize};
use starknet_types_core::felt::Felt;
use std::fmt;

/// Default cap on the number of blocks an `eth_getLogs` range may span.
pub const DEFAULT_MAX_LOGS_BLOCK_RANGE: u64 = 10_000;
/// Gas limit reported for every block.
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 7_000_000;

/// Parameters of the deployed execution layer. These are opaque constants supplied at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Ethereum chain id, checked on every submitted transaction.
    pub chain_id: u64,
    /// Native chain id, part of the native transaction hash.
    pub native_chain_id: Felt,
    pub execution_contract: Felt,
    /// Class of the account contracts deployed for Ethereum addresses.
    pub account_class_hash: Felt,
    /// ERC20 holding native balances.
    pub fee_token: Felt,
    pub gas_scale: GasScale,
    /// `max_fee` of the native invokes built for submitted transactions.
    pub max_fee: Felt,
    pub block_gas_limit: u64,
}

impl ChainConfig {
    pub fn mapping(&self) -> AddressMapping {
        AddressMapping::new(self.execution_contract, self.account_class_hash)
    }
}

/// Funded native account deploying user accounts on demand.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployerConfig {
    pub address: Felt,
    pub private_key: Felt,
}

impl fmt::Debug for DeployerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployerConfig").field("address", &self.address).field("private_key", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub chain: ChainConfig,
    pub deployer: DeployerConfig,
    pub max_logs_block_range: u64,
}
