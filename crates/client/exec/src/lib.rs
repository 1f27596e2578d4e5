//! Ethereum JSON-RPC semantics on top of the native chain.
//!
//! [`EthAdapter`] has one method per supported Ethereum method. State queries, calls and submissions go live to
//! the native chain through the [`NativeClient`]. Historical queries are served from the canonical store only.
//! The adapter never writes to the store.

use ec_db::StoreRead;
use ec_native_client::{BlockId as NativeBlockId, NativeClient};
use ep_block::rpc::{BlockId, BlockNumberOrTag};
use std::sync::{Arc, OnceLock};

mod address_book;
mod call;
mod chain;
mod config;
mod error;
mod history;
mod revert;
mod state;
mod submit;

pub use address_book::AddressBook;
pub use config::*;
pub use error::*;
pub use revert::{decode_reason, RevertDecoder, RevertDecoderV1};
pub use submit::DeployTicket;

/// Version string reported by `web3_clientVersion`.
pub const CLIENT_VERSION: &str = concat!("ethane/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct EthAdapter {
    config: Arc<AdapterConfig>,
    native: Arc<dyn NativeClient>,
    store: Arc<dyn StoreRead>,
    address_book: Arc<AddressBook>,
    revert_decoder: Arc<dyn RevertDecoder>,
    submitter: submit::Submitter,
    /// Canonical head when the adapter first saw the store lagging.
    sync_start: Arc<OnceLock<u64>>,
}

impl EthAdapter {
    pub fn new(config: AdapterConfig, native: Arc<dyn NativeClient>, store: Arc<dyn StoreRead>) -> Self {
        let config = Arc::new(config);
        let address_book = Arc::new(AddressBook::new(config.chain.mapping()));
        let submitter = submit::Submitter::new(Arc::clone(&config), Arc::clone(&native));
        Self {
            config,
            native,
            store,
            address_book,
            revert_decoder: Arc::new(RevertDecoderV1),
            submitter,
            sync_start: Default::default(),
        }
    }

    pub fn with_revert_decoder(mut self, revert_decoder: Arc<dyn RevertDecoder>) -> Self {
        self.revert_decoder = revert_decoder;
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.address_book
    }

    pub fn store(&self) -> &Arc<dyn StoreRead> {
        &self.store
    }

    /// Resolves an Ethereum block reference for a live state query.
    ///
    /// Tags resolve against the canonical store head, so that state queries and historical queries agree on what
    /// `latest` is. Before anything is indexed, tags fall back to the native chain's latest block.
    pub(crate) async fn resolve_state_block(&self, block: BlockId) -> ExecResult<NativeBlockId> {
        match block {
            BlockId::Hash(hash) => {
                let block = self.store.block_by_hash(hash).await?.ok_or(ExecError::ResourceNotFound("header"))?;
                Ok(NativeBlockId::Number(block.number()))
            }
            BlockId::Number(BlockNumberOrTag::Earliest) => Ok(NativeBlockId::Number(0)),
            BlockId::Number(BlockNumberOrTag::Number(number)) => {
                match self.store.head().await? {
                    Some(head) if number > head.number => Err(ExecError::ResourceNotFound("header")),
                    _ => Ok(NativeBlockId::Number(number)),
                }
            }
            BlockId::Number(_) => match self.store.head().await? {
                Some(head) => Ok(NativeBlockId::Number(head.number)),
                None => Ok(NativeBlockId::Latest),
            },
        }
    }
}
