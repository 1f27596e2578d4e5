pub mod chain;
pub mod indexer;
pub mod native;
pub mod rpc;
pub mod store;

pub use chain::*;
pub use indexer::*;
pub use native::*;
pub use rpc::*;
pub use store::*;

use anyhow::Context;
use ec_exec::AdapterConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ethane: Ethereum JSON-RPC for a Starknet rollup.
#[derive(Clone, Debug, clap::Parser, Deserialize, Serialize)]
#[command(version, about)]
pub struct RunCmd {
    /// Load the configuration from a TOML, JSON or YAML file instead of the command line and environment.
    #[arg(env = "ETHANE_CONFIG_FILE", long, value_name = "CONFIG FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    #[allow(missing_docs)]
    #[clap(flatten)]
    #[serde(flatten)]
    pub chain_params: ChainParams,

    #[allow(missing_docs)]
    #[clap(flatten)]
    #[serde(flatten)]
    pub native_params: NativeParams,

    #[allow(missing_docs)]
    #[clap(flatten)]
    #[serde(flatten)]
    pub store_params: StoreParams,

    #[allow(missing_docs)]
    #[clap(flatten)]
    #[serde(flatten)]
    pub indexer_params: IndexerParams,

    #[allow(missing_docs)]
    #[clap(flatten)]
    #[serde(flatten)]
    pub rpc_params: RpcParams,
}

impl RunCmd {
    pub fn adapter_config(&self) -> anyhow::Result<AdapterConfig> {
        Ok(AdapterConfig {
            chain: self.chain_params.chain_config().context("Invalid chain parameters")?,
            deployer: self.chain_params.deployer_config().context("Invalid deployer parameters")?,
            max_logs_block_range: self.rpc_params.rpc_max_logs_block_range,
        })
    }
}
