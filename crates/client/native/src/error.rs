/// Native error code for `CONTRACT_NOT_FOUND`.
pub const CONTRACT_NOT_FOUND: i32 = 20;
/// Native error code for `BLOCK_NOT_FOUND`.
pub const BLOCK_NOT_FOUND: i32 = 24;
/// Native error code for `TXN_HASH_NOT_FOUND`.
pub const TRANSACTION_HASH_NOT_FOUND: i32 = 29;
/// Native error code for `CONTRACT_ERROR`.
pub const CONTRACT_ERROR: i32 = 40;
/// Native error code for `TRANSACTION_EXECUTION_ERROR`.
pub const TRANSACTION_EXECUTION_ERROR: i32 = 41;
/// Native error code for `INVALID_TRANSACTION_NONCE`.
pub const INVALID_TRANSACTION_NONCE: i32 = 52;
/// Native error code for `INSUFFICIENT_ACCOUNT_BALANCE`.
pub const INSUFFICIENT_ACCOUNT_BALANCE: i32 = 54;
/// Native error code for `VALIDATION_FAILURE`.
pub const VALIDATION_FAILURE: i32 = 55;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeClientError {
    /// Transient failures persisted past the retry budget.
    #[error("Native backend unavailable for {method} after {attempts} attempts: {message}")]
    BackendUnavailable { method: &'static str, attempts: u32, message: String },
    /// The called contract failed. `revert_error` is the native error trace.
    #[error("Contract error: {revert_error}")]
    ContractError { revert_error: String },
    #[error("Native RPC error {code}: {message}")]
    Rpc { code: i32, message: String, data: Option<String> },
    #[error("Malformed native response: {0}")]
    Deserialize(String),
    #[error("Native client error: {0}")]
    Client(String),
}

impl NativeClientError {
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type NativeResult<T> = Result<T, NativeClientError>;
