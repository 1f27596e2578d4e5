use std::convert::Infallible;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::str::FromStr;

use ec_exec::DEFAULT_MAX_LOGS_BLOCK_RANGE;
use jsonrpsee::server::BatchRequestConfig;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// The default port.
pub const RPC_DEFAULT_PORT: u16 = 8545;
/// The default max request size in MiB.
#[allow(non_upper_case_globals)]
pub const RPC_DEFAULT_MAX_REQUEST_SIZE_MiB: u32 = 15;
/// The default max response size in MiB.
#[allow(non_upper_case_globals)]
pub const RPC_DEFAULT_MAX_RESPONSE_SIZE_MiB: u32 = 15;
/// The default number of connections.
pub const RPC_DEFAULT_MAX_CONNECTIONS: u32 = 100;

#[derive(Clone, Debug, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub enum Cors {
    /// All hosts allowed.
    All,
    /// Only hosts on the list are allowed.
    List(Vec<String>),
}

impl FromStr for Cors {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut is_all = false;
        let mut origins = Vec::new();
        for part in s.split(',') {
            match part.trim() {
                "all" | "*" => {
                    is_all = true;
                    break;
                }
                "" => {}
                other => origins.push(other.to_owned()),
            }
        }

        if is_all {
            Ok(Cors::All)
        } else {
            Ok(Cors::List(origins))
        }
    }
}

impl fmt::Display for Cors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cors::All => write!(f, "all"),
            Cors::List(origins) => write!(f, "{}", origins.join(",")),
        }
    }
}

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct RpcParams {
    /// Exposes the RPC endpoint on address 0.0.0.0. This generally means that RPC methods will be accessible from
    /// the outside world.
    #[arg(env = "ETHANE_RPC_EXTERNAL", long, default_value_t = false)]
    pub rpc_external: bool,

    /// The RPC port to listen at.
    #[arg(env = "ETHANE_RPC_PORT", long, value_name = "PORT", default_value_t = RPC_DEFAULT_PORT)]
    pub rpc_port: u16,

    /// Set the maximum RPC request payload size in mebibytes.
    #[arg(env = "ETHANE_RPC_MAX_REQUEST_SIZE", long, default_value_t = RPC_DEFAULT_MAX_REQUEST_SIZE_MiB)]
    pub rpc_max_request_size: u32,

    /// Set the maximum RPC response payload size in mebibytes.
    #[arg(env = "ETHANE_RPC_MAX_RESPONSE_SIZE", long, default_value_t = RPC_DEFAULT_MAX_RESPONSE_SIZE_MiB)]
    pub rpc_max_response_size: u32,

    /// Maximum number of RPC server connections at a given time.
    #[arg(env = "ETHANE_RPC_MAX_CONNECTIONS", long, value_name = "COUNT", default_value_t = RPC_DEFAULT_MAX_CONNECTIONS)]
    pub rpc_max_connections: u32,

    /// Maximum number of RPC calls per minute, across all connections. Unlimited when unset.
    #[arg(env = "ETHANE_RPC_RATE_LIMIT", long, value_name = "CALLS")]
    pub rpc_rate_limit: Option<NonZeroU32>,

    /// Maximum number of blocks an `eth_getLogs` range may span.
    #[arg(env = "ETHANE_RPC_MAX_LOGS_BLOCK_RANGE", long, value_name = "BLOCKS", default_value_t = DEFAULT_MAX_LOGS_BLOCK_RANGE)]
    pub rpc_max_logs_block_range: u64,

    /// Disable RPC batch requests.
    #[arg(env = "ETHANE_RPC_DISABLE_BATCH_REQUESTS", long, conflicts_with_all = &["rpc_max_batch_request_len"])]
    pub rpc_disable_batch_requests: bool,

    /// Limit the max length for an RPC batch request.
    #[arg(env = "ETHANE_RPC_MAX_BATCH_REQUEST_LEN", long, conflicts_with_all = &["rpc_disable_batch_requests"], value_name = "LEN")]
    pub rpc_max_batch_request_len: Option<u32>,

    /// Specify browser *origins* allowed to access the HTTP RPC server.
    ///
    /// Default behavior depends on `rpc_external`:
    ///
    ///     - If rpc_external is set, CORS will default to allow all incoming addresses.
    ///     - If rpc_external is not set, CORS will default to allow only connections from `localhost`.
    ///
    /// This argument is a comma separated list of origins, or the special `all` value. An origin ending in `:*`
    /// matches any port.
    #[arg(env = "ETHANE_RPC_CORS", long, value_name = "ORIGINS")]
    pub rpc_cors: Option<Cors>,
}

impl RpcParams {
    pub fn cors(&self) -> Option<Vec<String>> {
        let cors = self.rpc_cors.clone().unwrap_or_else(|| {
            if self.rpc_external {
                Cors::All
            } else {
                Cors::List(vec![
                    "http://localhost:*".into(),
                    "http://127.0.0.1:*".into(),
                    "https://localhost:*".into(),
                    "https://127.0.0.1:*".into(),
                ])
            }
        });

        match cors {
            Cors::All => None,
            Cors::List(ls) => Some(ls),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        let listen_addr = if self.rpc_external {
            Ipv4Addr::UNSPECIFIED // listen on 0.0.0.0
        } else {
            Ipv4Addr::LOCALHOST
        };

        SocketAddr::new(listen_addr.into(), self.rpc_port)
    }

    pub fn batch_config(&self) -> BatchRequestConfig {
        if self.rpc_disable_batch_requests {
            BatchRequestConfig::Disabled
        } else if let Some(l) = self.rpc_max_batch_request_len {
            BatchRequestConfig::Limit(l)
        } else {
            BatchRequestConfig::Unlimited
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::all("all", Cors::All)]
    #[case::star("http://a.com,*", Cors::All)]
    #[case::list("http://a.com, http://b.com", Cors::List(vec!["http://a.com".into(), "http://b.com".into()]))]
    fn test_cors_from_str(#[case] input: &str, #[case] expected: Cors) {
        assert_eq!(Cors::from_str(input).unwrap(), expected);
    }

    #[test]
    fn test_cors_display_parses_back() {
        let cors = Cors::List(vec!["http://localhost:*".into(), "https://app.example".into()]);
        assert_eq!(Cors::from_str(&cors.to_string()).unwrap(), cors);
    }
}
