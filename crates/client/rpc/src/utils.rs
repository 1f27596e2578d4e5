use std::fmt;

use crate::EthRpcApiError;

pub trait ResultExt<T, E> {
    fn or_internal_server_error<C: fmt::Display>(self, context: C) -> Result<T, EthRpcApiError>;
}

impl<T, E: Into<anyhow::Error>> ResultExt<T, E> for Result<T, E> {
    #[inline]
    fn or_internal_server_error<C: fmt::Display>(self, context: C) -> Result<T, EthRpcApiError> {
        match self {
            Ok(val) => Ok(val),
            Err(err) => {
                tracing::error!(target: "rpc_errors", "{}: {:#}", context, E::into(err));
                Err(EthRpcApiError::InternalServerError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_or_internal_server_error_logs_context() {
        let res: Result<u64, std::io::Error> = Err(std::io::Error::other("disk on fire"));
        assert_eq!(res.or_internal_server_error("Reading head"), Err(EthRpcApiError::InternalServerError));
        assert!(logs_contain("Reading head: disk on fire"));
    }
}
