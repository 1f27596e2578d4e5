use std::time::Duration;

use ec_native_client::NativeClientConfig;
use ep_utils::parsers::{parse_duration, parse_url};
use ep_utils::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct NativeParams {
    /// Starknet JSON-RPC endpoint of the native chain.
    #[arg(env = "ETHANE_NATIVE_URL", long, value_parser = parse_url, value_name = "URL", default_value = "http://localhost:5050")]
    pub native_url: Url,

    /// Timeout of state reads and block fetches.
    #[arg(env = "ETHANE_NATIVE_READ_TIMEOUT", long, value_parser = parse_duration, default_value = "10s")]
    #[serde(serialize_with = "ep_utils::serde::serialize_duration", deserialize_with = "ep_utils::serde::deserialize_duration")]
    pub native_read_timeout: Duration,

    /// Timeout of fee estimations.
    #[arg(env = "ETHANE_NATIVE_ESTIMATE_TIMEOUT", long, value_parser = parse_duration, default_value = "20s")]
    #[serde(serialize_with = "ep_utils::serde::serialize_duration", deserialize_with = "ep_utils::serde::deserialize_duration")]
    pub native_estimate_timeout: Duration,

    /// Timeout of transaction submissions. Submissions are never retried.
    #[arg(env = "ETHANE_NATIVE_SUBMIT_TIMEOUT", long, value_parser = parse_duration, default_value = "30s")]
    #[serde(serialize_with = "ep_utils::serde::serialize_duration", deserialize_with = "ep_utils::serde::deserialize_duration")]
    pub native_submit_timeout: Duration,

    /// Number of attempts for reads and estimates failing with a transport error, including the first one.
    #[arg(env = "ETHANE_NATIVE_RETRY_ATTEMPTS", long, value_name = "COUNT", default_value_t = 5)]
    pub native_retry_attempts: u32,
}

impl NativeParams {
    pub fn client_config(&self) -> NativeClientConfig {
        NativeClientConfig {
            url: self.native_url.clone(),
            read_timeout: self.native_read_timeout,
            estimate_timeout: self.native_estimate_timeout,
            submit_timeout: self.native_submit_timeout,
            retry: RetryConfig { max_attempts: self.native_retry_attempts, ..Default::default() },
        }
    }
}
