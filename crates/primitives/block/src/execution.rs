//! Calldata and event layout of the native execution contract.

use alloy::primitives::{Address, B256, U256};
use ep_convert::{
    address_to_felt, bytes_to_felts, felt_to_address, felt_to_b256, felt_to_bool, felt_to_u64, felts_to_bytes,
    join_u256, split_u256, CodecError,
};
use lazy_static::lazy_static;
use starknet_core::utils::starknet_keccak;
use starknet_types_core::felt::Felt;

lazy_static! {
    // Execution contract entrypoints
    pub static ref ETH_SEND_TRANSACTION: Felt = starknet_keccak(b"eth_send_transaction");
    pub static ref ETH_CALL: Felt = starknet_keccak(b"eth_call");
    pub static ref DEPLOY_EXTERNALLY_OWNED_ACCOUNT: Felt = starknet_keccak(b"deploy_externally_owned_account");

    // Account entrypoints
    pub static ref GET_EVM_ADDRESS: Felt = starknet_keccak(b"get_evm_address");
    pub static ref BYTECODE: Felt = starknet_keccak(b"bytecode");
    pub static ref STORAGE: Felt = starknet_keccak(b"storage");

    // Fee token
    pub static ref BALANCE_OF: Felt = starknet_keccak(b"balanceOf");

    // Events
    pub static ref EVM_LOG_EVENT: Felt = starknet_keccak(b"evm_log");
    pub static ref TRANSACTION_EXECUTED_EVENT: Felt = starknet_keccak(b"transaction_executed");
}

/// `[call_array_len, contract, selector, data_offset, data_len, calldata_len]`
pub const EXECUTE_HEADER_LEN: usize = 6;
pub const MAX_TOPICS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionLayoutError {
    #[error("Invalid {what} length: expected {expected}, got {actual}")]
    Length { what: &'static str, expected: usize, actual: usize },
    #[error("Invalid execute calldata header: {0}")]
    Header(&'static str),
    #[error("Odd number of topic halves in log keys")]
    OddTopicKeys,
    #[error("Log has {0} topics, at most 4 are allowed")]
    TooManyTopics(usize),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

fn expect_len(what: &'static str, expected: usize, actual: usize) -> Result<(), ExecutionLayoutError> {
    if expected != actual {
        return Err(ExecutionLayoutError::Length { what, expected, actual });
    }
    Ok(())
}

fn len_felt(felt: &Felt) -> Result<usize, ExecutionLayoutError> {
    Ok(felt_to_u64(felt)? as usize)
}

/// Account `__execute__` calldata forwarding a signing payload to `eth_send_transaction`.
pub fn encode_execute_calldata(execution_contract: Felt, payload: &[u8]) -> Vec<Felt> {
    let mut calldata = Vec::with_capacity(EXECUTE_HEADER_LEN + payload.len());
    calldata.extend_from_slice(&[
        Felt::ONE,
        execution_contract,
        *ETH_SEND_TRANSACTION,
        Felt::ZERO,
        Felt::from(payload.len()),
        Felt::from(payload.len()),
    ]);
    calldata.extend(bytes_to_felts(payload));
    calldata
}

/// Extracts the signing payload from account calldata.
///
/// Returns `None` when the calldata is not a call to `eth_send_transaction` on the execution contract, and an
/// error when it is one but the payload is malformed.
pub fn decode_execute_calldata(
    execution_contract: Felt,
    calldata: &[Felt],
) -> Option<Result<Vec<u8>, ExecutionLayoutError>> {
    match calldata {
        [count, contract, selector, ..]
            if *count == Felt::ONE && *contract == execution_contract && *selector == *ETH_SEND_TRANSACTION =>
        {
            Some(decode_execute_payload(calldata))
        }
        _ => None,
    }
}

fn decode_execute_payload(calldata: &[Felt]) -> Result<Vec<u8>, ExecutionLayoutError> {
    if calldata.len() < EXECUTE_HEADER_LEN {
        return Err(ExecutionLayoutError::Header("truncated"));
    }
    if calldata[3] != Felt::ZERO {
        return Err(ExecutionLayoutError::Header("non-zero data offset"));
    }
    let data_len = len_felt(&calldata[4])?;
    let calldata_len = len_felt(&calldata[5])?;
    if data_len != calldata_len {
        return Err(ExecutionLayoutError::Header("data length mismatch"));
    }
    let bytes = &calldata[EXECUTE_HEADER_LEN..];
    expect_len("execute payload", data_len, bytes.len())?;
    Ok(felts_to_bytes(bytes)?)
}

/// Deployer `__execute__` calldata calling `deploy_externally_owned_account(evm_address)`.
pub fn encode_deploy_calldata(execution_contract: Felt, evm_address: Address) -> Vec<Felt> {
    vec![
        Felt::ONE,
        execution_contract,
        *DEPLOY_EXTERNALLY_OWNED_ACCOUNT,
        Felt::ZERO,
        Felt::ONE,
        Felt::ONE,
        address_to_felt(evm_address),
    ]
}

/// Returns the Ethereum address whose account the calldata deploys, if it is a deploy call.
pub fn decode_deploy_calldata(execution_contract: Felt, calldata: &[Felt]) -> Option<Address> {
    match calldata {
        [count, contract, selector, offset, data_len, calldata_len, address]
            if *count == Felt::ONE
                && *contract == execution_contract
                && *selector == *DEPLOY_EXTERNALLY_OWNED_ACCOUNT
                && *offset == Felt::ZERO
                && *data_len == Felt::ONE
                && *calldata_len == Felt::ONE =>
        {
            felt_to_address(address).ok()
        }
        _ => None,
    }
}

/// Calldata of the execution contract's `eth_call` view.
pub fn encode_eth_call_calldata(
    origin: Address,
    to: Option<Address>,
    gas_limit: u64,
    gas_price: u128,
    value: U256,
    data: &[u8],
) -> Vec<Felt> {
    let mut calldata = Vec::with_capacity(8 + data.len());
    calldata.push(address_to_felt(origin));
    match to {
        Some(to) => calldata.extend_from_slice(&[Felt::ONE, address_to_felt(to)]),
        None => calldata.extend_from_slice(&[Felt::ZERO, Felt::ZERO]),
    }
    calldata.push(Felt::from(gas_limit));
    calldata.push(Felt::from(gas_price));
    calldata.extend_from_slice(&split_u256(value));
    calldata.push(Felt::from(data.len()));
    calldata.extend(bytes_to_felts(data));
    calldata
}

/// Outcome of an EVM execution, shared by the `eth_call` view result and the `transaction_executed` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub return_data: Vec<u8>,
    pub success: bool,
    pub native_gas_used: u64,
}

/// `[ret_len, ret..., success, gas_used]`, followed by `trailer` extra felts.
fn decode_outcome(felts: &[Felt], trailer: usize) -> Result<(ExecutionOutcome, &[Felt]), ExecutionLayoutError> {
    let Some((len, rest)) = felts.split_first() else {
        return Err(ExecutionLayoutError::Length { what: "execution outcome", expected: 3 + trailer, actual: 0 });
    };
    let len = len_felt(len)?;
    expect_len("execution outcome", len.saturating_add(3 + trailer), felts.len())?;
    let outcome = ExecutionOutcome {
        return_data: felts_to_bytes(&rest[..len])?,
        success: felt_to_bool(&rest[len])?,
        native_gas_used: felt_to_u64(&rest[len + 1])?,
    };
    Ok((outcome, &rest[len + 2..]))
}

fn encode_outcome(outcome: &ExecutionOutcome) -> Vec<Felt> {
    let mut felts = Vec::with_capacity(3 + outcome.return_data.len());
    felts.push(Felt::from(outcome.return_data.len()));
    felts.extend(bytes_to_felts(&outcome.return_data));
    felts.push(Felt::from(outcome.success as u8));
    felts.push(Felt::from(outcome.native_gas_used));
    felts
}

pub fn decode_eth_call_result(felts: &[Felt]) -> Result<ExecutionOutcome, ExecutionLayoutError> {
    decode_outcome(felts, 0).map(|(outcome, _)| outcome)
}

pub fn encode_eth_call_result(outcome: &ExecutionOutcome) -> Vec<Felt> {
    encode_outcome(outcome)
}

/// `evm_log` event: keys `[selector, evm_address, t0.low, t0.high, ...]`, data one felt per byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmLogEvent {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

impl EvmLogEvent {
    pub fn keys(&self) -> Vec<Felt> {
        let mut keys = Vec::with_capacity(2 + 2 * self.topics.len());
        keys.push(*EVM_LOG_EVENT);
        keys.push(address_to_felt(self.address));
        for topic in &self.topics {
            keys.extend_from_slice(&split_u256(U256::from_be_bytes(topic.0)));
        }
        keys
    }

    pub fn data(&self) -> Vec<Felt> {
        bytes_to_felts(&self.data)
    }

    /// Parses an event whose first key is [`EVM_LOG_EVENT`].
    pub fn parse(keys: &[Felt], data: &[Felt]) -> Result<Self, ExecutionLayoutError> {
        let [_, address, topic_halves @ ..] = keys else {
            return Err(ExecutionLayoutError::Length { what: "evm_log keys", expected: 2, actual: keys.len() });
        };
        if topic_halves.len() % 2 != 0 {
            return Err(ExecutionLayoutError::OddTopicKeys);
        }
        if topic_halves.len() / 2 > MAX_TOPICS {
            return Err(ExecutionLayoutError::TooManyTopics(topic_halves.len() / 2));
        }
        let topics = topic_halves
            .chunks_exact(2)
            .map(|halves| join_u256(&halves[0], &halves[1]).map(|topic| B256::from(topic.to_be_bytes::<32>())))
            .collect::<Result<_, _>>()?;

        Ok(Self { address: felt_to_address(address)?, topics, data: felts_to_bytes(data)? })
    }
}

/// `transaction_executed` event: keys `[selector]`, data `[ret_len, ret..., success, gas_used, created_address]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionExecutedEvent {
    pub outcome: ExecutionOutcome,
    pub created_address: Option<Address>,
}

impl TransactionExecutedEvent {
    pub fn keys(&self) -> Vec<Felt> {
        vec![*TRANSACTION_EXECUTED_EVENT]
    }

    pub fn data(&self) -> Vec<Felt> {
        let mut data = encode_outcome(&self.outcome);
        data.push(self.created_address.map(address_to_felt).unwrap_or(Felt::ZERO));
        data
    }

    /// Parses an event whose first key is [`TRANSACTION_EXECUTED_EVENT`].
    pub fn parse(keys: &[Felt], data: &[Felt]) -> Result<Self, ExecutionLayoutError> {
        expect_len("transaction_executed keys", 1, keys.len())?;
        let (outcome, trailer) = decode_outcome(data, 1)?;
        let created_address = match trailer[0] {
            created if created == Felt::ZERO => None,
            created => Some(felt_to_address(&created)?),
        };
        Ok(Self { outcome, created_address })
    }
}

/// Converts a native hash to the 32-byte word used on the Ethereum side.
pub fn native_hash_to_b256(hash: &Felt) -> B256 {
    felt_to_b256(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;
    use assert_matches::assert_matches;

    const EXECUTION_CONTRACT: Felt = Felt::from_hex_unchecked("0x7777");

    #[test]
    fn test_execute_calldata_round_trip() {
        let payload = vec![0x02, 0xf8, 0x6b, 0x00, 0xff];
        let calldata = encode_execute_calldata(EXECUTION_CONTRACT, &payload);
        assert_eq!(calldata.len(), EXECUTE_HEADER_LEN + payload.len());
        assert_eq!(decode_execute_calldata(EXECUTION_CONTRACT, &calldata).unwrap().unwrap(), payload);
    }

    #[test]
    fn test_execute_calldata_not_matching() {
        let calldata = encode_execute_calldata(EXECUTION_CONTRACT, &[1, 2, 3]);
        assert!(decode_execute_calldata(Felt::from_hex_unchecked("0x8888"), &calldata).is_none());
        assert!(decode_execute_calldata(EXECUTION_CONTRACT, &[Felt::TWO]).is_none());
    }

    #[test]
    fn test_execute_calldata_malformed() {
        let mut calldata = encode_execute_calldata(EXECUTION_CONTRACT, &[1, 2, 3]);
        calldata.pop();
        assert_matches!(
            decode_execute_calldata(EXECUTION_CONTRACT, &calldata),
            Some(Err(ExecutionLayoutError::Length { expected: 3, actual: 2, .. }))
        );

        let mut calldata = encode_execute_calldata(EXECUTION_CONTRACT, &[1, 2, 3]);
        calldata[EXECUTE_HEADER_LEN] = Felt::from(300u16);
        assert_matches!(
            decode_execute_calldata(EXECUTION_CONTRACT, &calldata),
            Some(Err(ExecutionLayoutError::Codec(CodecError::ValueOutOfRange { .. })))
        );
    }

    #[test]
    fn test_deploy_calldata() {
        let address = Address::with_last_byte(0x42);
        let calldata = encode_deploy_calldata(EXECUTION_CONTRACT, address);
        assert_eq!(decode_deploy_calldata(EXECUTION_CONTRACT, &calldata), Some(address));
        assert_eq!(decode_deploy_calldata(EXECUTION_CONTRACT, &encode_execute_calldata(EXECUTION_CONTRACT, &[1])), None);
    }

    #[test]
    fn test_evm_log_layout() {
        let log = EvmLogEvent {
            address: Address::with_last_byte(0xcc),
            topics: vec![
                b256!("ffffffffffffffffffffffffffffffff00000000000000000000000000000001"),
                B256::with_last_byte(3),
            ],
            data: vec![0; 32],
        };
        let keys = log.keys();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[2], Felt::ONE);
        assert_eq!(keys[3], Felt::from(u128::MAX));
        assert_eq!(EvmLogEvent::parse(&keys, &log.data()).unwrap(), log);
    }

    #[test]
    fn test_evm_log_rejects_odd_topic_keys() {
        let keys = vec![*EVM_LOG_EVENT, Felt::ONE, Felt::ONE];
        assert_matches!(EvmLogEvent::parse(&keys, &[]), Err(ExecutionLayoutError::OddTopicKeys));
    }

    #[test]
    fn test_evm_log_rejects_five_topics() {
        let mut keys = vec![*EVM_LOG_EVENT, Felt::ONE];
        keys.extend(std::iter::repeat(Felt::ZERO).take(10));
        assert_matches!(EvmLogEvent::parse(&keys, &[]), Err(ExecutionLayoutError::TooManyTopics(5)));
    }

    #[test]
    fn test_transaction_executed_layout() {
        let event = TransactionExecutedEvent {
            outcome: ExecutionOutcome { return_data: vec![0xde, 0xad], success: false, native_gas_used: 1234 },
            created_address: Some(Address::with_last_byte(9)),
        };
        assert_eq!(TransactionExecutedEvent::parse(&event.keys(), &event.data()).unwrap(), event);
    }

    #[test]
    fn test_transaction_executed_rejects_wrong_length() {
        let data = vec![Felt::ZERO, Felt::ONE];
        assert_matches!(
            TransactionExecutedEvent::parse(&[*TRANSACTION_EXECUTED_EVENT], &data),
            Err(ExecutionLayoutError::Length { what: "execution outcome", .. })
        );
    }
}
