use ec_exec::ExecError;
use ep_block::Bytes;
use jsonrpsee::types::error::{INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE};
use jsonrpsee::types::ErrorObjectOwned;
use serde_json::json;

pub type EthRpcResult<T> = Result<T, EthRpcApiError>;

/// Error code of a reverted execution, as returned by geth.
pub const EXECUTION_REVERTED_CODE: i32 = 3;
pub const RESOURCE_NOT_FOUND_CODE: i32 = -32000;
pub const BACKEND_UNAVAILABLE_CODE: i32 = -32003;

fn revert_suffix(reason: &Option<String>) -> String {
    reason.as_ref().map(|reason| format!(": {reason}")).unwrap_or_default()
}

#[cfg_attr(test, derive(PartialEq, Eq))]
#[derive(thiserror::Error, Debug)]
pub enum EthRpcApiError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Invalid block range: {0}")]
    InvalidBlockRange(String),
    #[error("{0}")]
    ValueOutOfRange(String),
    #[error("execution reverted{}", revert_suffix(.reason))]
    ExecutionReverted { reason: Option<String>, data: Bytes },
    #[error("{0} not found")]
    ResourceNotFound(&'static str),
    #[error("Native backend unavailable")]
    BackendUnavailable,
    #[error("Internal server error")]
    InternalServerError,
}

impl From<&EthRpcApiError> for i32 {
    fn from(err: &EthRpcApiError) -> Self {
        match err {
            EthRpcApiError::InvalidParams(_)
            | EthRpcApiError::InvalidBlockRange(_)
            | EthRpcApiError::ValueOutOfRange(_) => INVALID_PARAMS_CODE,
            EthRpcApiError::ExecutionReverted { .. } => EXECUTION_REVERTED_CODE,
            EthRpcApiError::ResourceNotFound(_) => RESOURCE_NOT_FOUND_CODE,
            EthRpcApiError::BackendUnavailable => BACKEND_UNAVAILABLE_CODE,
            EthRpcApiError::InternalServerError => INTERNAL_ERROR_CODE,
        }
    }
}

impl EthRpcApiError {
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            EthRpcApiError::ExecutionReverted { data, .. } => Some(json!(data)),
            _ => None,
        }
    }
}

impl From<ExecError> for EthRpcApiError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::InvalidParams(message) => Self::InvalidParams(message),
            ExecError::ExecutionReverted { reason, data } => Self::ExecutionReverted { reason, data },
            ExecError::InvalidBlockRange(message) => Self::InvalidBlockRange(message),
            ExecError::ResourceNotFound(resource) => Self::ResourceNotFound(resource),
            ExecError::ValueOutOfRange(err) => Self::ValueOutOfRange(err.to_string()),
            ExecError::BackendUnavailable(message) => {
                tracing::warn!(target: "rpc_errors", "{message}");
                Self::BackendUnavailable
            }
            err @ (ExecError::Native(_) | ExecError::Store(_) | ExecError::Internal(_)) => {
                tracing::error!(target: "rpc_errors", "{err:#}");
                Self::InternalServerError
            }
        }
    }
}

impl From<EthRpcApiError> for ErrorObjectOwned {
    fn from(err: EthRpcApiError) -> Self {
        ErrorObjectOwned::owned((&err).into(), err.to_string(), err.data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ec_exec::ExecError;
    use rstest::rstest;

    #[rstest]
    #[case::invalid_params(ExecError::InvalidParams("bad".into()), -32602, "Invalid params: bad")]
    #[case::range(ExecError::InvalidBlockRange("100 > 50".into()), -32602, "Invalid block range: 100 > 50")]
    #[case::not_found(ExecError::ResourceNotFound("header"), -32000, "header not found")]
    #[case::backend(ExecError::BackendUnavailable("timeout".into()), -32003, "Native backend unavailable")]
    #[case::internal(ExecError::Store("connection reset".into()), -32603, "Internal server error")]
    fn test_error_codes(#[case] err: ExecError, #[case] code: i32, #[case] message: &str) {
        let object = ErrorObjectOwned::from(EthRpcApiError::from(err));
        assert_eq!(object.code(), code);
        assert_eq!(object.message(), message);
        assert!(object.data().is_none());
    }

    #[rstest]
    #[case::with_reason(Some("counter overflow".to_string()), "execution reverted: counter overflow")]
    #[case::without_reason(None, "execution reverted")]
    fn test_execution_reverted(#[case] reason: Option<String>, #[case] message: &str) {
        let err = ExecError::ExecutionReverted { reason, data: Bytes::from_static(&[0xde, 0xad]) };
        let object = ErrorObjectOwned::from(EthRpcApiError::from(err));
        assert_eq!(object.code(), 3);
        assert_eq!(object.message(), message);
        assert_eq!(object.data().map(|data| data.get()), Some("\"0xdead\""));
    }

    #[test]
    fn test_internal_error_is_redacted() {
        let err = EthRpcApiError::from(ExecError::Internal("secret detail".into()));
        assert_eq!(err, EthRpcApiError::InternalServerError);
        assert!(!ErrorObjectOwned::from(err).message().contains("secret"));
    }
}
