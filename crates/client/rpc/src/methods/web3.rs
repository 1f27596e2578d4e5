use jsonrpsee::core::RpcResult;

use crate::{Eth, Web3RpcApiServer};

impl Web3RpcApiServer for Eth {
    fn client_version(&self) -> RpcResult<String> {
        Ok(self.adapter.client_version().to_string())
    }
}
