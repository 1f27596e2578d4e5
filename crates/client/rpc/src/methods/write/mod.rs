use ep_block::{Bytes, B256};
use jsonrpsee::core::{async_trait, RpcResult};

use crate::{Eth, EthWriteRpcApiServer};

mod send_raw_transaction;

use send_raw_transaction::send_raw_transaction;

#[async_trait]
impl EthWriteRpcApiServer for Eth {
    async fn send_raw_transaction(&self, transaction: Bytes) -> RpcResult<B256> {
        Ok(send_raw_transaction(self, transaction).await?)
    }
}
