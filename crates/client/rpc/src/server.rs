use std::net::SocketAddr;
use std::num::NonZeroU32;

use anyhow::Context;
use jsonrpsee::server::middleware::rpc::RpcServiceBuilder;
use jsonrpsee::server::{BatchRequestConfig, ServerHandle};
use jsonrpsee::RpcModule;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::middleware::{RpcMiddlewareLayerLogging, RpcMiddlewareLayerRateLimit};

const MEBIBYTE: u32 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub addr: SocketAddr,
    pub batch_config: BatchRequestConfig,
    pub max_connections: u32,
    pub max_payload_in_mib: u32,
    pub max_payload_out_mib: u32,
    /// Calls per minute, unlimited when [`None`].
    pub rate_limit: Option<NonZeroU32>,
    /// Allowed origins, any origin when [`None`].
    pub cors: Option<Vec<String>>,
    pub methods: RpcModule<()>,
}

/// Whether `origin` is allowed by `pattern`. A pattern ending in `:*` allows any port.
fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.strip_suffix(":*") {
        Some(prefix) => {
            origin.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
        }
        None => pattern == origin,
    }
}

fn cors_layer(cors: Option<Vec<String>>) -> CorsLayer {
    match cors {
        None => CorsLayer::permissive(),
        Some(allowed) => CorsLayer::new().allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin.to_str().is_ok_and(|origin| allowed.iter().any(|pattern| origin_matches(pattern, origin)))
        })),
    }
}

/// Binds the server and starts serving `config.methods`. Returns the bound address, which differs from
/// `config.addr` when binding to port 0.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<(SocketAddr, ServerHandle)> {
    let ServerConfig {
        name,
        addr,
        batch_config,
        max_connections,
        max_payload_in_mib,
        max_payload_out_mib,
        rate_limit,
        cors,
        methods,
    } = config;

    let http_middleware = tower::ServiceBuilder::new().layer(cors_layer(cors));
    let rpc_middleware = RpcServiceBuilder::new()
        .layer(RpcMiddlewareLayerLogging)
        .option_layer(rate_limit.map(RpcMiddlewareLayerRateLimit::new));

    let server = jsonrpsee::server::Server::builder()
        .max_connections(max_connections)
        .max_request_body_size(max_payload_in_mib.saturating_mul(MEBIBYTE))
        .max_response_body_size(max_payload_out_mib.saturating_mul(MEBIBYTE))
        .set_batch_request_config(batch_config)
        .set_http_middleware(http_middleware)
        .set_rpc_middleware(rpc_middleware)
        .build(addr)
        .await
        .with_context(|| format!("Binding {name} server to {addr}"))?;

    let local_addr = server.local_addr().context("Getting the server's local address")?;
    tracing::info!("📱 Running {name} server at http://{local_addr}");

    Ok((local_addr, server.start(methods)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::any_port("http://localhost:*", "http://localhost:3000", true)]
    #[case::no_port("http://localhost:*", "http://localhost", true)]
    #[case::other_host("http://localhost:*", "http://localhost.evil.com", false)]
    #[case::exact("https://app.example", "https://app.example", true)]
    #[case::scheme("https://app.example", "http://app.example", false)]
    fn test_origin_matches(#[case] pattern: &str, #[case] origin: &str, #[case] expected: bool) {
        assert_eq!(origin_matches(pattern, origin), expected);
    }
}
