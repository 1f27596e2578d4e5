use std::time::Duration;

use ec_indexer::IndexerConfig;
use ep_utils::parsers::parse_duration;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct IndexerParams {
    /// Disable the indexer. The gateway then only serves what is already in the store.
    #[arg(env = "ETHANE_NO_INDEXER", long)]
    pub no_indexer: bool,

    /// First native block indexed into an empty store.
    #[arg(env = "ETHANE_INDEXER_START_BLOCK", long, value_name = "BLOCK NUMBER", default_value_t = 0)]
    pub indexer_start_block: u64,

    /// Delay between two polls of the native chain head once caught up.
    #[arg(env = "ETHANE_INDEXER_POLL_INTERVAL", long, value_parser = parse_duration, default_value = "2s")]
    #[serde(serialize_with = "ep_utils::serde::serialize_duration", deserialize_with = "ep_utils::serde::deserialize_duration")]
    pub indexer_poll_interval: Duration,

    /// Number of canonical blocks a reorg may replace before the indexer halts.
    #[arg(env = "ETHANE_INDEXER_MAX_REORG_DEPTH", long, value_name = "BLOCKS", default_value_t = 64)]
    pub indexer_max_reorg_depth: u64,
}

impl IndexerParams {
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            start_block: self.indexer_start_block,
            poll_interval: self.indexer_poll_interval,
            max_reorg_depth: self.indexer_max_reorg_depth,
            ..Default::default()
        }
    }
}
