use ec_rpc::{rpc_module, start_server, Eth, ServerConfig};
use ep_utils::service::{EthaneServiceId, Service, ServiceId, ServiceRunner};

use crate::cli::RpcParams;

pub struct RpcService {
    server_config: ServerConfig,
}

impl RpcService {
    pub fn new(config: &RpcParams, eth: &Eth) -> anyhow::Result<Self> {
        let server_config = ServerConfig {
            name: "JSON-RPC".to_string(),
            addr: config.addr(),
            batch_config: config.batch_config(),
            max_connections: config.rpc_max_connections,
            max_payload_in_mib: config.rpc_max_request_size,
            max_payload_out_mib: config.rpc_max_response_size,
            rate_limit: config.rpc_rate_limit,
            cors: config.cors(),
            methods: rpc_module(eth)?,
        };

        Ok(Self { server_config })
    }
}

#[async_trait::async_trait]
impl Service for RpcService {
    async fn start<'a>(&mut self, runner: ServiceRunner<'a>) -> anyhow::Result<()> {
        let server_config = self.server_config.clone();

        runner.service_loop(move |ctx| async move {
            let (_, server_handle) = start_server(server_config).await?;

            ctx.cancelled().await;
            tracing::info!("🔌 Shutting down RPC server");
            if server_handle.stop().is_ok() {
                server_handle.stopped().await;
            }

            anyhow::Ok(())
        });

        Ok(())
    }
}

impl ServiceId for RpcService {
    #[inline(always)]
    fn svc_id(&self) -> EthaneServiceId {
        EthaneServiceId::Rpc
    }
}
