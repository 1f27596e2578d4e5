mod indexer;
mod rpc;

pub use indexer::IndexerService;
pub use rpc::RpcService;
