use jsonrpsee::core::RpcResult;

use crate::{Eth, NetRpcApiServer};

impl NetRpcApiServer for Eth {
    fn version(&self) -> RpcResult<String> {
        Ok(self.adapter.net_version())
    }
}
