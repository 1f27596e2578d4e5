use ec_db::StoreError;
use ec_native_client::NativeClientError;
use ep_block::Bytes;
use ep_convert::CodecError;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    /// `data` holds the raw revert bytes, `reason` the decoded `Error(string)` message if there is one.
    #[error("Execution reverted")]
    ExecutionReverted { reason: Option<String>, data: Bytes },
    #[error("Invalid block range: {0}")]
    InvalidBlockRange(String),
    #[error("{0} not found")]
    ResourceNotFound(&'static str),
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error(transparent)]
    ValueOutOfRange(CodecError),
    #[error("Native client error: {0}")]
    Native(NativeClientError),
    #[error("Storage error: {0}")]
    Store(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExecError {
    pub fn reverted(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self::ExecutionReverted { reason: crate::revert::decode_reason(&data), data }
    }
}

impl From<NativeClientError> for ExecError {
    fn from(err: NativeClientError) -> Self {
        match err {
            NativeClientError::BackendUnavailable { .. } => Self::BackendUnavailable(err.to_string()),
            err => Self::Native(err),
        }
    }
}

impl From<StoreError> for ExecError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<CodecError> for ExecError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::ValueOutOfRange { .. } => Self::ValueOutOfRange(err),
            err => Self::InvalidParams(err.to_string()),
        }
    }
}
