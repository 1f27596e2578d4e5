use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use ec_db::{MemoryStore, MongoStore, MongoStoreConfig, StoreRead, StoreWrite};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Mongo,
    /// Lost on restart. Only useful for local testing.
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Mongo => write!(f, "mongo"),
            StoreKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct StoreParams {
    /// Backend of the canonical store.
    #[arg(env = "ETHANE_STORE", long, value_enum, default_value_t = StoreKind::Mongo)]
    pub store: StoreKind,

    /// MongoDB connection string.
    #[arg(env = "ETHANE_MONGODB_URI", long, value_name = "URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database holding the canonical collections.
    #[arg(env = "ETHANE_MONGODB_DATABASE", long, value_name = "NAME", default_value = "ethane")]
    pub mongodb_database: String,
}

impl StoreParams {
    /// Opens the configured store. The RPC gateway reads from it and the indexer writes to it.
    pub async fn open(&self) -> anyhow::Result<(Arc<dyn StoreRead>, Arc<dyn StoreWrite>)> {
        match self.store {
            StoreKind::Mongo => {
                let config = MongoStoreConfig { uri: self.mongodb_uri.clone(), database: self.mongodb_database.clone() };
                let store = Arc::new(MongoStore::connect(&config).await.context("Connecting to MongoDB")?);
                Ok((Arc::clone(&store) as _, store as _))
            }
            StoreKind::Memory => {
                tracing::warn!("⚠️  Using the in-memory store, indexed data will be lost on restart");
                let store = Arc::new(MemoryStore::new());
                Ok((Arc::clone(&store) as _, store as _))
            }
        }
    }
}
