use crate::error::*;
use crate::types::*;
use crate::NativeClient;
use async_trait::async_trait;
use ep_utils::retry::{RetryConfig, RetryState};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use starknet_types_core::felt::Felt;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeClientConfig {
    #[serde(serialize_with = "ep_utils::serde::serialize_url", deserialize_with = "ep_utils::serde::deserialize_url")]
    pub url: Url,
    /// Budget for state reads and block fetches.
    #[serde(
        serialize_with = "ep_utils::serde::serialize_duration",
        deserialize_with = "ep_utils::serde::deserialize_duration"
    )]
    pub read_timeout: Duration,
    #[serde(
        serialize_with = "ep_utils::serde::serialize_duration",
        deserialize_with = "ep_utils::serde::deserialize_duration"
    )]
    pub estimate_timeout: Duration,
    #[serde(
        serialize_with = "ep_utils::serde::serialize_duration",
        deserialize_with = "ep_utils::serde::deserialize_duration"
    )]
    pub submit_timeout: Duration,
    pub retry: RetryConfig,
}

impl NativeClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            read_timeout: Duration::from_secs(10),
            estimate_timeout: Duration::from_secs(20),
            submit_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Read,
    Estimate,
    Submit,
}

/// Outcome of a single attempt which may be retried.
enum Failure {
    Fatal(NativeClientError),
    Transient(String),
}

fn classify(err: ClientError) -> Failure {
    match err {
        ClientError::Call(err) => {
            let data: Option<Value> = err.data().and_then(|raw| serde_json::from_str(raw.get()).ok());
            let field = |name: &str| data.as_ref().and_then(|data| data.get(name)).map(value_to_string);
            let fatal = match err.code() {
                CONTRACT_ERROR => NativeClientError::ContractError {
                    revert_error: field("revert_error").unwrap_or_else(|| err.message().to_string()),
                },
                TRANSACTION_EXECUTION_ERROR => NativeClientError::ContractError {
                    revert_error: field("execution_error").unwrap_or_else(|| err.message().to_string()),
                },
                code => NativeClientError::Rpc {
                    code,
                    message: err.message().to_string(),
                    data: data.as_ref().map(value_to_string),
                },
            };
            Failure::Fatal(fatal)
        }
        ClientError::Transport(err) => Failure::Transient(err.to_string()),
        ClientError::RestartNeeded(err) => Failure::Transient(err.to_string()),
        ClientError::RequestTimeout => Failure::Transient("request timeout".to_string()),
        ClientError::ParseError(err) => Failure::Fatal(NativeClientError::Deserialize(err.to_string())),
        err => Failure::Fatal(NativeClientError::Client(err.to_string())),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_value(value: impl Serialize) -> NativeResult<Value> {
    serde_json::to_value(value).map_err(|err| NativeClientError::Client(err.to_string()))
}

/// [`NativeClient`] over HTTP JSON-RPC.
///
/// Transport failures and timeouts of reads and estimates are retried with backoff, up to
/// [`RetryConfig::max_attempts`]. Submissions and native error responses are never retried.
pub struct JsonRpcNativeClient {
    client: HttpClient,
    config: NativeClientConfig,
}

impl JsonRpcNativeClient {
    pub fn new(config: NativeClientConfig) -> NativeResult<Self> {
        let max_budget = config.read_timeout.max(config.estimate_timeout).max(config.submit_timeout);
        let client = HttpClientBuilder::default()
            .request_timeout(max_budget)
            .build(config.url.as_str())
            .map_err(|err| NativeClientError::Client(err.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &NativeClientConfig {
        &self.config
    }

    async fn request<R>(&self, method: &'static str, params: Vec<Value>, kind: CallKind) -> NativeResult<R>
    where
        R: DeserializeOwned + Send,
    {
        let (budget, retry) = match kind {
            CallKind::Read => (self.config.read_timeout, self.config.retry.clone()),
            CallKind::Estimate => (self.config.estimate_timeout, self.config.retry.clone()),
            // the invoke may have been accepted even if we never saw the response
            CallKind::Submit => (self.config.submit_timeout, RetryConfig::no_retry()),
        };
        let mut retry = RetryState::new(retry);

        loop {
            let mut array = ArrayParams::new();
            for param in &params {
                array.insert(param).map_err(|err| NativeClientError::Client(err.to_string()))?;
            }

            let message = match tokio::time::timeout(budget, self.client.request::<R, _>(method, array)).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(err)) => match classify(err) {
                    Failure::Fatal(err) => return Err(err),
                    Failure::Transient(message) => message,
                },
                Err(_elapsed) => format!("timed out after {budget:?}"),
            };

            match retry.next_attempt() {
                Some(delay) => {
                    if retry.should_log() {
                        tracing::warn!(
                            "Native call {method} failed ({message}), retrying in {delay:?} [attempt {}]",
                            retry.attempts()
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(NativeClientError::BackendUnavailable { method, attempts: retry.attempts(), message });
                }
            }
        }
    }
}

fn not_found_as_none<T>(result: NativeResult<T>, code: i32) -> NativeResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.code() == Some(code) => Ok(None),
        Err(err) => Err(err),
    }
}

#[async_trait]
impl NativeClient for JsonRpcNativeClient {
    async fn chain_id(&self) -> NativeResult<Felt> {
        self.request("starknet_chainId", vec![], CallKind::Read).await
    }

    async fn block_hash_and_number(&self) -> NativeResult<BlockHashAndNumber> {
        self.request("starknet_blockHashAndNumber", vec![], CallKind::Read).await
    }

    async fn get_nonce(&self, block_id: BlockId, contract_address: Felt) -> NativeResult<Felt> {
        let params = vec![to_value(block_id)?, to_value(contract_address)?];
        self.request("starknet_getNonce", params, CallKind::Read).await
    }

    async fn get_class_hash_at(&self, block_id: BlockId, contract_address: Felt) -> NativeResult<Option<Felt>> {
        let params = vec![to_value(block_id)?, to_value(contract_address)?];
        not_found_as_none(self.request("starknet_getClassHashAt", params, CallKind::Read).await, CONTRACT_NOT_FOUND)
    }

    async fn call(&self, request: FunctionCall, block_id: BlockId) -> NativeResult<Vec<Felt>> {
        let params = vec![to_value(request)?, to_value(block_id)?];
        self.request("starknet_call", params, CallKind::Read).await
    }

    async fn estimate_fee(&self, transaction: BroadcastedInvokeV1, block_id: BlockId) -> NativeResult<FeeEstimate> {
        let params = vec![to_value([transaction])?, to_value(["SKIP_VALIDATE"])?, to_value(block_id)?];
        let estimates: Vec<FeeEstimate> = self.request("starknet_estimateFee", params, CallKind::Estimate).await?;
        estimates.into_iter().next().ok_or_else(|| NativeClientError::Deserialize("empty fee estimate".to_string()))
    }

    async fn add_invoke_transaction(&self, transaction: BroadcastedInvokeV1) -> NativeResult<Felt> {
        let params = vec![to_value(transaction)?];
        let result: InvokeResult = self.request("starknet_addInvokeTransaction", params, CallKind::Submit).await?;
        Ok(result.transaction_hash)
    }

    async fn get_transaction_status(&self, transaction_hash: Felt) -> NativeResult<Option<TransactionStatus>> {
        let params = vec![to_value(transaction_hash)?];
        not_found_as_none(
            self.request("starknet_getTransactionStatus", params, CallKind::Read).await,
            TRANSACTION_HASH_NOT_FOUND,
        )
    }

    async fn get_block_with_tx_hashes(&self, block_id: BlockId) -> NativeResult<Option<BlockWithTxHashes>> {
        let params = vec![to_value(block_id)?];
        not_found_as_none(self.request("starknet_getBlockWithTxHashes", params, CallKind::Read).await, BLOCK_NOT_FOUND)
    }

    async fn get_block_with_receipts(&self, block_id: BlockId) -> NativeResult<Option<NativeBlock>> {
        let params = vec![to_value(block_id)?];
        not_found_as_none(self.request("starknet_getBlockWithReceipts", params, CallKind::Read).await, BLOCK_NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use httpmock::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    fn client(server: &MockServer, max_attempts: u32) -> JsonRpcNativeClient {
        let config = NativeClientConfig {
            url: server.base_url().parse().unwrap(),
            read_timeout: Duration::from_millis(200),
            estimate_timeout: Duration::from_millis(200),
            submit_timeout: Duration::from_millis(200),
            retry: RetryConfig {
                max_attempts,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                log_interval: Duration::from_secs(10),
            },
        };
        JsonRpcNativeClient::new(config).unwrap()
    }

    fn invoke() -> BroadcastedInvokeV1 {
        BroadcastedInvokeV1 {
            sender_address: Felt::from(1u8),
            calldata: vec![],
            max_fee: Felt::ZERO,
            signature: vec![],
            nonce: Felt::ZERO,
            is_query: false,
        }
    }

    #[tokio::test]
    async fn test_get_nonce() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).json_body_partial(
                    r#"{ "method": "starknet_getNonce", "params": [{ "block_number": 5 }, "0x2a"] }"#,
                );
                then.status(200).json_body(json!({ "jsonrpc": "2.0", "id": 0, "result": "0x7" }));
            })
            .await;

        let nonce = client(&server, 3).get_nonce(BlockId::Number(5), Felt::from(42u8)).await.unwrap();
        assert_eq!(nonce, Felt::from(7u8));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_contract_not_found_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).json_body_partial(r#"{ "method": "starknet_getClassHashAt" }"#);
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0", "id": 0, "error": { "code": 20, "message": "Contract not found" }
                }));
            })
            .await;

        let class_hash = client(&server, 3).get_class_hash_at(BlockId::Latest, Felt::ONE).await.unwrap();
        assert_eq!(class_hash, None);
    }

    #[rstest]
    #[case::received(json!({ "finality_status": "RECEIVED" }), FinalityStatus::Received, None, true)]
    #[case::rejected(json!({ "finality_status": "REJECTED" }), FinalityStatus::Rejected, None, false)]
    #[case::accepted(
        json!({ "finality_status": "ACCEPTED_ON_L2", "execution_status": "SUCCEEDED" }),
        FinalityStatus::AcceptedOnL2,
        Some(ExecutionStatus::Succeeded),
        false
    )]
    #[case::reverted(
        json!({ "finality_status": "ACCEPTED_ON_L1", "execution_status": "REVERTED" }),
        FinalityStatus::AcceptedOnL1,
        Some(ExecutionStatus::Reverted),
        false
    )]
    #[tokio::test]
    async fn test_get_transaction_status(
        #[case] result: Value,
        #[case] finality_status: FinalityStatus,
        #[case] execution_status: Option<ExecutionStatus>,
        #[case] in_flight: bool,
    ) {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).json_body_partial(r#"{ "method": "starknet_getTransactionStatus", "params": ["0x99"] }"#);
                then.status(200).json_body(json!({ "jsonrpc": "2.0", "id": 0, "result": result }));
            })
            .await;

        let status = client(&server, 3).get_transaction_status(Felt::from(0x99u64)).await.unwrap().unwrap();
        assert_eq!(status, TransactionStatus { finality_status, execution_status });
        assert_eq!(status.is_in_flight(), in_flight);
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).json_body_partial(r#"{ "method": "starknet_getTransactionStatus" }"#);
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0", "id": 0, "error": { "code": 29, "message": "Transaction hash not found" }
                }));
            })
            .await;

        assert_eq!(client(&server, 3).get_transaction_status(Felt::ONE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503);
            })
            .await;

        let err = client(&server, 3).get_nonce(BlockId::Latest, Felt::ONE).await.unwrap_err();
        assert_matches!(err, NativeClientError::BackendUnavailable { method: "starknet_getNonce", attempts: 3, .. });
        assert_eq!(mock.hits_async().await, 3);
    }

    #[tokio::test]
    async fn test_native_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0", "id": 0,
                    "error": { "code": 40, "message": "Contract error", "data": { "revert_error": "0x1 failed" } }
                }));
            })
            .await;

        let request = FunctionCall { contract_address: Felt::ONE, entry_point_selector: Felt::TWO, calldata: vec![] };
        let err = client(&server, 3).call(request, BlockId::Latest).await.unwrap_err();
        assert_eq!(err, NativeClientError::ContractError { revert_error: "0x1 failed".to_string() });
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_malformed_response_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({ "jsonrpc": "2.0", "id": 0, "result": { "unexpected": true } }));
            })
            .await;

        let err = client(&server, 3).get_nonce(BlockId::Latest, Felt::ONE).await.unwrap_err();
        assert_matches!(err, NativeClientError::Deserialize(_));
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_submission_is_attempted_once() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).json_body_partial(r#"{ "method": "starknet_addInvokeTransaction" }"#);
                then.status(503);
            })
            .await;

        let err = client(&server, 5).add_invoke_transaction(invoke()).await.unwrap_err();
        assert_matches!(err, NativeClientError::BackendUnavailable { attempts: 1, .. });
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .json_body(json!({ "jsonrpc": "2.0", "id": 0, "result": "0x1" }));
            })
            .await;

        let err = client(&server, 2).block_hash_and_number().await.unwrap_err();
        assert_matches!(err, NativeClientError::BackendUnavailable { attempts: 2, ref message, .. } if message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_estimate_fee_skips_validation() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).json_body_partial(
                    r#"{ "method": "starknet_estimateFee", "params": [[{ "version": "0x100000000000000000000000000000001" }], ["SKIP_VALIDATE"], "latest"] }"#,
                );
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0", "id": 0,
                    "result": [{ "gas_consumed": "0x64", "gas_price": "0x2", "overall_fee": "0xc8", "unit": "WEI" }]
                }));
            })
            .await;

        let estimate = client(&server, 1)
            .estimate_fee(BroadcastedInvokeV1 { is_query: true, ..invoke() }, BlockId::Latest)
            .await
            .unwrap();
        assert_eq!(estimate.gas_consumed, Felt::from(100u8));
        mock.assert_async().await;
    }
}
