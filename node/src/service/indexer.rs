use std::sync::Arc;

use anyhow::Context;
use ec_db::StoreWrite;
use ec_indexer::{BlockDecoder, BlockSource, Indexer, IndexerConfig};
use ep_utils::service::{EthaneServiceId, Service, ServiceId, ServiceRunner};

pub struct IndexerService {
    indexer: Option<Indexer>,
}

impl IndexerService {
    pub fn new(
        config: IndexerConfig,
        decoder: BlockDecoder,
        source: Arc<dyn BlockSource>,
        store: Arc<dyn StoreWrite>,
    ) -> Self {
        Self { indexer: Some(Indexer::new(config, decoder, source, store)) }
    }
}

#[async_trait::async_trait]
impl Service for IndexerService {
    async fn start<'a>(&mut self, runner: ServiceRunner<'a>) -> anyhow::Result<()> {
        let indexer = self.indexer.take().context("Indexer service can only be started once")?;

        runner.service_loop(move |ctx| indexer.run(ctx));

        Ok(())
    }
}

impl ServiceId for IndexerService {
    #[inline(always)]
    fn svc_id(&self) -> EthaneServiceId {
        EthaneServiceId::Indexer
    }
}
