//! Ethane node command line.
#![warn(missing_docs)]

mod cli;
mod service;
mod util;

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use cli::RunCmd;
use ec_exec::EthAdapter;
use ec_indexer::{BlockDecoder, DecoderConfig, NativeClientSource};
use ec_native_client::{JsonRpcNativeClient, NativeClient};
use ec_rpc::Eth;
use ep_utils::service::ServiceMonitor;
use figment::{
    providers::{Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use service::{IndexerService, RpcService};

const GREET_IMPL_NAME: &str = "Ethane";
const GREET_SUPPORT_URL: &str = "https://github.com/ethane-rpc/ethane/issues";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    crate::util::setup_logging()?;

    // Command line and environment first. A config file, when given, overrides them field by field.
    let cli_args = RunCmd::parse();
    let mut config = Figment::new().merge(Serialized::defaults(cli_args.clone()));

    if let Some(config_path) = cli_args.config_file {
        config = match config_path.extension() {
            None => bail!("Unsupported file type for config file."),
            Some(os_str) => match os_str.to_str() {
                Some("toml") => config.merge(Toml::file(config_path)),
                Some("json") => config.merge(Json::file(config_path)),
                Some("yaml") => config.merge(Yaml::file(config_path)),
                _ => bail!("Unsupported file type for config file."),
            },
        }
    }

    // Extracts the arguments into the struct
    let run_cmd: RunCmd = config.extract().context("Loading configuration")?;
    let adapter_config = run_cmd.adapter_config()?;

    tracing::info!("⛽ {} Node", GREET_IMPL_NAME);
    tracing::info!("✌️  Version {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("💁 Support URL: {}", GREET_SUPPORT_URL);
    tracing::info!(
        "🌐 Chain id {} (native `{:#x}`), execution contract {:#x}",
        adapter_config.chain.chain_id,
        adapter_config.chain.native_chain_id,
        adapter_config.chain.execution_contract
    );
    tracing::info!("🔗 Native RPC: {}", run_cmd.native_params.native_url);
    tracing::info!("💾 Store: {}", run_cmd.store_params.store);

    // ===================================================================== //
    //                             SERVICES (SETUP)                          //
    // ===================================================================== //

    let native: Arc<dyn NativeClient> = Arc::new(
        JsonRpcNativeClient::new(run_cmd.native_params.client_config()).context("Initializing native client")?,
    );

    let (store_read, store_write) = run_cmd.store_params.open().await.context("Initializing canonical store")?;

    let decoder = BlockDecoder::new(DecoderConfig {
        mapping: adapter_config.chain.mapping(),
        gas_scale: adapter_config.chain.gas_scale,
        block_gas_limit: adapter_config.chain.block_gas_limit,
    });

    let eth = Eth::new(EthAdapter::new(adapter_config, Arc::clone(&native), store_read));
    let service_rpc = RpcService::new(&run_cmd.rpc_params, &eth).context("Initializing rpc service")?;

    // ===================================================================== //
    //                             SERVICES (START)                          //
    // ===================================================================== //

    let mut app = ServiceMonitor::default().with(service_rpc)?;

    if run_cmd.indexer_params.no_indexer {
        tracing::info!("🚫 Indexer disabled, serving the store as is");
    } else {
        let service_indexer = IndexerService::new(
            run_cmd.indexer_params.indexer_config(),
            decoder,
            Arc::new(NativeClientSource::new(native)),
            store_write,
        );
        app = app.with(service_indexer)?;
    }

    app.start().await?;

    tracing::info!("🔌 Shutting down");

    Ok(())
}
