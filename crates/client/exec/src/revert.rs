//! Recovery of EVM revert data from native execution failures.
//!
//! When the execution contract reverts, the native chain only reports an error trace. How the revert bytes are
//! embedded in that trace depends on the execution contract version, so decoding is pluggable and versioned.

use alloy::sol_types::{Revert, SolError};
use ep_convert::felts_to_bytes;
use starknet_types_core::felt::Felt;

const FAILURE_REASON: &str = "Failure reason:";

pub trait RevertDecoder: Send + Sync {
    fn version(&self) -> u32;

    /// Extracts the EVM revert bytes from a native error trace, if it carries any.
    fn decode(&self, revert_error: &str) -> Option<Vec<u8>>;
}

/// The execution contract panics with the revert bytes as its failure reason, one felt per byte:
/// `... Failure reason: (0x8, 0xc3, 0x79, ...).`
#[derive(Debug, Clone, Copy, Default)]
pub struct RevertDecoderV1;

impl RevertDecoder for RevertDecoderV1 {
    fn version(&self) -> u32 {
        1
    }

    fn decode(&self, revert_error: &str) -> Option<Vec<u8>> {
        let (_, reason) = revert_error.rsplit_once(FAILURE_REASON)?;
        let felts = reason
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')' | '[' | ']' | '.'))
            .filter(|token| token.starts_with("0x"))
            .map(Felt::from_hex)
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        if felts.is_empty() {
            return None;
        }
        felts_to_bytes(&felts).ok()
    }
}

/// Decodes the message of a Solidity `Error(string)` revert.
pub fn decode_reason(data: &[u8]) -> Option<String> {
    Revert::abi_decode(data, true).ok().map(|revert| revert.reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn error_string(reason: &str) -> Vec<u8> {
        Revert { reason: reason.to_string() }.abi_encode()
    }

    #[test]
    fn test_decode_reason() {
        assert_eq!(decode_reason(&error_string("counter overflow")).as_deref(), Some("counter overflow"));
        assert_eq!(decode_reason(&[0xde, 0xad]), None);
        assert_eq!(decode_reason(&[]), None);
    }

    #[rstest]
    #[case::tuple("Error in the called contract (0x1):\nExecution failed. Failure reason: (0xde, 0xad).", Some(vec![0xde, 0xad]))]
    #[case::list("Failure reason: [0x1, 0x2, 0x3]", Some(vec![1, 2, 3]))]
    #[case::not_bytes("Execution failed. Failure reason: 0x4b4b ('KK').", None)]
    #[case::no_reason("Error at pc=0:37: Got an exception while executing a hint.", None)]
    #[case::empty("Failure reason: ().", None)]
    fn test_decoder_v1(#[case] trace: &str, #[case] expected: Option<Vec<u8>>) {
        assert_eq!(RevertDecoderV1.decode(trace), expected);
    }

    #[test]
    fn test_decoder_v1_round_trips_error_string() {
        let data = error_string("nope");
        let felts = data.iter().map(|byte| format!("{:#x}", byte)).collect::<Vec<_>>().join(", ");
        let trace = format!("Execution failed. Failure reason: ({felts}).");

        let decoded = RevertDecoderV1.decode(&trace).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(decode_reason(&decoded).as_deref(), Some("nope"));
    }
}
