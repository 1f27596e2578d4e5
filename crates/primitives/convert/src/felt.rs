use crate::{CodecError, CodecResult};
use alloy::primitives::{Address, B256, U256};
use starknet_types_core::felt::Felt;

/// The Starknet field modulus `P = 2^251 + 17 * 2^192 + 1`.
pub const FELT_MODULUS: U256 = U256::from_limbs([1, 0, 0, 0x0800_0000_0000_0011]);

const MAX_ADDRESS: Felt = Felt::from_hex_unchecked("0xffffffffffffffffffffffffffffffffffffffff");

/// Converts a 256-bit word into a field element. Values greater or equal to the field modulus fail instead of
/// being reduced.
pub fn u256_to_felt(value: U256) -> CodecResult<Felt> {
    if value >= FELT_MODULUS {
        return Err(CodecError::out_of_range(format!("{value:#x}"), "felt"));
    }
    Ok(Felt::from_bytes_be(&value.to_be_bytes::<32>()))
}

pub fn felt_to_u256(felt: &Felt) -> U256 {
    U256::from_be_bytes(felt.to_bytes_be())
}

pub fn b256_to_felt(value: B256) -> CodecResult<Felt> {
    u256_to_felt(U256::from_be_bytes(value.0))
}

pub fn felt_to_b256(felt: &Felt) -> B256 {
    B256::from(felt.to_bytes_be())
}

pub fn address_to_felt(address: Address) -> Felt {
    Felt::from_bytes_be_slice(address.as_slice())
}

pub fn felt_to_address(felt: &Felt) -> CodecResult<Address> {
    if felt > &MAX_ADDRESS {
        return Err(CodecError::out_of_range(format!("{felt:#x}"), "address"));
    }
    let bytes = felt.to_bytes_be();
    Ok(Address::from_slice(&bytes[12..]))
}

pub fn felt_to_u64(felt: &Felt) -> CodecResult<u64> {
    let digits = felt.to_be_digits();
    match (digits[0], digits[1], digits[2], digits[3]) {
        (0, 0, 0, d) => Ok(d),
        _ => Err(CodecError::out_of_range(format!("{felt:#x}"), "u64")),
    }
}

pub fn felt_to_u128(felt: &Felt) -> CodecResult<u128> {
    let digits = felt.to_be_digits();
    match (digits[0], digits[1], digits[2], digits[3]) {
        (0, 0, d1, d2) => Ok((d1 as u128) << 64 | d2 as u128),
        _ => Err(CodecError::out_of_range(format!("{felt:#x}"), "u128")),
    }
}

pub fn felt_to_u8(felt: &Felt) -> CodecResult<u8> {
    let value = felt_to_u64(felt).map_err(|_| CodecError::out_of_range(format!("{felt:#x}"), "byte"))?;
    u8::try_from(value).map_err(|_| CodecError::out_of_range(format!("{felt:#x}"), "byte"))
}

/// Reads a cairo boolean, which must be exactly `0` or `1`.
pub fn felt_to_bool(felt: &Felt) -> CodecResult<bool> {
    match felt_to_u64(felt) {
        Ok(0) => Ok(false),
        Ok(1) => Ok(true),
        _ => Err(CodecError::out_of_range(format!("{felt:#x}"), "bool")),
    }
}

/// Splits a 256-bit word into its `[low, high]` 128-bit halves, the layout of a cairo `Uint256`.
pub fn split_u256(value: U256) -> [Felt; 2] {
    let limbs = value.as_limbs();
    let low = (limbs[1] as u128) << 64 | limbs[0] as u128;
    let high = (limbs[3] as u128) << 64 | limbs[2] as u128;
    [Felt::from(low), Felt::from(high)]
}

/// Inverse of [`split_u256`]. Each half must fit in 128 bits.
pub fn join_u256(low: &Felt, high: &Felt) -> CodecResult<U256> {
    let low = felt_to_u128(low)?;
    let high = felt_to_u128(high)?;
    Ok(U256::from(high) << 128 | U256::from(low))
}

/// Encodes a byte payload with one felt per byte, the calldata convention of the execution contract.
pub fn bytes_to_felts(bytes: &[u8]) -> Vec<Felt> {
    bytes.iter().map(|b| Felt::from(*b)).collect()
}

pub fn felts_to_bytes(felts: &[Felt]) -> CodecResult<Vec<u8>> {
    felts.iter().map(felt_to_u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_modulus_matches_felt_max() {
        assert_eq!(felt_to_u256(&Felt::MAX) + U256::from(1u8), FELT_MODULUS);
    }

    #[test]
    fn test_u256_to_felt_bounds() {
        assert_eq!(u256_to_felt(U256::ZERO).unwrap(), Felt::ZERO);
        assert_eq!(u256_to_felt(FELT_MODULUS - U256::from(1u8)).unwrap(), Felt::MAX);
        assert_matches!(u256_to_felt(FELT_MODULUS), Err(CodecError::ValueOutOfRange { target: "felt", .. }));
        assert_matches!(u256_to_felt(U256::MAX), Err(CodecError::ValueOutOfRange { .. }));
    }

    #[test]
    fn test_felt_to_address() {
        const MAX_ADDRESS_BYTES: [u8; 20] = [0xff; 20];
        assert_eq!(felt_to_address(&Felt::ZERO).unwrap(), Address::ZERO);
        assert_eq!(felt_to_address(&Felt::THREE).unwrap(), Address::with_last_byte(3));
        assert_eq!(
            felt_to_address(&Felt::from_bytes_be_slice(&MAX_ADDRESS_BYTES)).unwrap(),
            Address::from(MAX_ADDRESS_BYTES)
        );
        assert_matches!(
            felt_to_address(&(Felt::from_bytes_be_slice(&MAX_ADDRESS_BYTES) + Felt::ONE)),
            Err(CodecError::ValueOutOfRange { target: "address", .. })
        );
        assert_matches!(felt_to_address(&Felt::MAX), Err(CodecError::ValueOutOfRange { .. }));
    }

    #[test]
    fn test_felt_to_u64() {
        assert_eq!(felt_to_u64(&Felt::ZERO).unwrap(), 0);
        assert_eq!(felt_to_u64(&Felt::from(u64::MAX)).unwrap(), u64::MAX);
        assert!(felt_to_u64(&(Felt::from(u64::MAX) + Felt::ONE)).is_err());
        assert!(felt_to_u64(&Felt::MAX).is_err());
    }

    #[test]
    fn test_felt_to_u128() {
        assert_eq!(felt_to_u128(&Felt::from(u64::MAX)).unwrap(), u64::MAX as u128);
        assert_eq!(felt_to_u128(&Felt::from(u128::MAX)).unwrap(), u128::MAX);
        assert!(felt_to_u128(&(Felt::from(u128::MAX) + Felt::ONE)).is_err());
    }

    #[rstest]
    #[case::zero(0, Ok(false))]
    #[case::one(1, Ok(true))]
    #[case::two(2, Err(()))]
    fn test_felt_to_bool(#[case] value: u64, #[case] expected: Result<bool, ()>) {
        assert_eq!(felt_to_bool(&Felt::from(value)).map_err(|_| ()), expected);
    }

    #[test]
    fn test_split_u256_layout() {
        let value = U256::from(u128::MAX) + U256::from(5u8);
        let [low, high] = split_u256(value);
        assert_eq!(low, Felt::from(4u8));
        assert_eq!(high, Felt::ONE);
    }

    #[test]
    fn test_join_u256_rejects_wide_halves() {
        let wide = Felt::from(u128::MAX) + Felt::ONE;
        assert_matches!(join_u256(&wide, &Felt::ZERO), Err(CodecError::ValueOutOfRange { target: "u128", .. }));
    }

    #[test]
    fn test_felts_to_bytes_rejects_wide_felt() {
        assert_eq!(felts_to_bytes(&bytes_to_felts(&[0, 1, 255])).unwrap(), vec![0, 1, 255]);
        assert_matches!(felts_to_bytes(&[Felt::from(256u16)]), Err(CodecError::ValueOutOfRange { .. }));
    }

    fn arb_u256() -> impl Strategy<Value = U256> {
        any::<[u8; 32]>().prop_map(U256::from_be_bytes)
    }

    proptest! {
        #[test]
        fn prop_felt_round_trip(value in arb_u256()) {
            match u256_to_felt(value) {
                Ok(felt) => prop_assert_eq!(felt_to_u256(&felt), value),
                Err(err) => {
                    prop_assert!(value >= FELT_MODULUS);
                    let is_out_of_range = matches!(err, CodecError::ValueOutOfRange { .. });
                    prop_assert!(is_out_of_range);
                }
            }
        }

        #[test]
        fn prop_split_join_round_trip(value in arb_u256()) {
            let [low, high] = split_u256(value);
            prop_assert_eq!(join_u256(&low, &high).unwrap(), value);
        }

        #[test]
        fn prop_address_round_trip(bytes in any::<[u8; 20]>()) {
            let address = Address::from(bytes);
            prop_assert_eq!(felt_to_address(&address_to_felt(address)).unwrap(), address);
        }

        #[test]
        fn prop_bytes_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(felts_to_bytes(&bytes_to_felts(&bytes)).unwrap(), bytes);
        }
    }
}
