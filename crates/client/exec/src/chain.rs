use crate::{EthAdapter, ExecError, ExecResult, CLIENT_VERSION};
use ec_native_client::BlockId as NativeBlockId;
use ep_block::rpc::{SyncInfo, SyncStatus};
use ep_block::U256;
use ep_convert::felt_to_u256;

impl EthAdapter {
    pub fn chain_id(&self) -> u64 {
        self.config.chain.chain_id
    }

    /// `eth_blockNumber`, the canonical head. 0 before anything is indexed.
    pub async fn block_number(&self) -> ExecResult<u64> {
        Ok(self.store.head().await?.map(|head| head.number).unwrap_or(0))
    }

    /// `eth_syncing`: whether the canonical store lags behind the native chain.
    pub async fn syncing(&self) -> ExecResult<SyncStatus> {
        let native_head = self.native.block_hash_and_number().await?.block_number;
        let current_block = self.block_number().await?;
        if current_block >= native_head {
            return Ok(SyncStatus::NotSyncing(false));
        }
        let starting_block = *self.sync_start.get_or_init(|| current_block);
        Ok(SyncStatus::Syncing(SyncInfo { starting_block, current_block, highest_block: native_head }))
    }

    /// `eth_gasPrice`, the scaled L1 gas price of the latest native block.
    pub async fn gas_price(&self) -> ExecResult<U256> {
        let block = self
            .native
            .get_block_with_tx_hashes(NativeBlockId::Latest)
            .await?
            .ok_or(ExecError::ResourceNotFound("block"))?;
        let native_price = felt_to_u256(&block.header.l1_gas_price.price_in_wei);
        Ok(self.config.chain.gas_scale.to_evm_gas_price(native_price))
    }

    pub fn net_version(&self) -> String {
        self.config.chain.chain_id.to_string()
    }

    pub fn client_version(&self) -> &'static str {
        CLIENT_VERSION
    }
}
