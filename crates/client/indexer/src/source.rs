use async_trait::async_trait;
use ec_native_client::{BlockHashAndNumber, BlockId, NativeBlock, NativeClient, NativeResult};
use starknet_types_core::felt::Felt;
use std::sync::Arc;

/// Ordered access to closed native blocks.
///
/// Delivery is at-least-once: the pipeline may ask for the same block several times and must not depend on a
/// block being served only once.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn latest(&self) -> NativeResult<BlockHashAndNumber>;

    /// The block at `number` with its receipts and events, [`None`] past the tip.
    async fn block(&self, number: u64) -> NativeResult<Option<NativeBlock>>;

    async fn block_hash(&self, number: u64) -> NativeResult<Option<Felt>> {
        Ok(self.block(number).await?.map(|block| block.header.block_hash))
    }
}

pub struct NativeClientSource {
    client: Arc<dyn NativeClient>,
}

impl NativeClientSource {
    pub fn new(client: Arc<dyn NativeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlockSource for NativeClientSource {
    async fn latest(&self) -> NativeResult<BlockHashAndNumber> {
        self.client.block_hash_and_number().await
    }

    async fn block(&self, number: u64) -> NativeResult<Option<NativeBlock>> {
        self.client.get_block_with_receipts(BlockId::Number(number)).await
    }

    async fn block_hash(&self, number: u64) -> NativeResult<Option<Felt>> {
        let block = self.client.get_block_with_tx_hashes(BlockId::Number(number)).await?;
        Ok(block.map(|block| block.header.block_hash))
    }
}
