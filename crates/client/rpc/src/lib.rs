//! Ethereum JSON-RPC gateway.
//!
//! Exposes the `eth`, `net` and `web3` namespaces over an [`EthAdapter`], and serves them over HTTP with
//! per-call logging and rate limiting.

mod api;
mod errors;
mod methods;
pub mod middleware;
mod server;
pub mod utils;

use ec_exec::EthAdapter;
use jsonrpsee::RpcModule;

pub use api::*;
pub use errors::*;
pub use server::{start_server, ServerConfig};

/// The Ethereum RPC handlers, shared by every namespace.
#[derive(Clone)]
pub struct Eth {
    adapter: EthAdapter,
}

impl Eth {
    pub fn new(adapter: EthAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &EthAdapter {
        &self.adapter
    }
}

/// Returns the RpcModule merged with every supported namespace.
pub fn rpc_module(eth: &Eth) -> anyhow::Result<RpcModule<()>> {
    let mut rpc_api = RpcModule::new(());

    rpc_api.merge(EthReadRpcApiServer::into_rpc(eth.clone()))?;
    rpc_api.merge(EthWriteRpcApiServer::into_rpc(eth.clone()))?;
    rpc_api.merge(NetRpcApiServer::into_rpc(eth.clone()))?;
    rpc_api.merge(Web3RpcApiServer::into_rpc(eth.clone()))?;

    Ok(rpc_api)
}
