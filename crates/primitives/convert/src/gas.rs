use crate::{CodecError, CodecResult};
use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Conversion between native gas units and the synthetic EVM gas reported to Ethereum tooling.
///
/// `evm_gas = ceil(native_gas * numerator / denominator)`. Gas prices are scaled by the inverse ratio so that
/// `evm_gas * evm_price` stays equal to the native fee.
///
/// The scale is versioned: every indexed receipt records the version it was computed with, and a changed ratio
/// must come with a new version since it changes the meaning of historical gas-used values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasScale {
    pub version: u32,
    pub numerator: u64,
    pub denominator: u64,
}

impl Default for GasScale {
    fn default() -> Self {
        Self::V1
    }
}

impl GasScale {
    pub const V1: Self = Self { version: 1, numerator: 1, denominator: 1 };

    pub fn new(version: u32, numerator: u64, denominator: u64) -> CodecResult<Self> {
        if numerator == 0 {
            return Err(CodecError::out_of_range(numerator, "gas scale numerator"));
        }
        if denominator == 0 {
            return Err(CodecError::out_of_range(denominator, "gas scale denominator"));
        }
        Ok(Self { version, numerator, denominator })
    }

    pub fn to_evm_gas(&self, native_gas: u64) -> u64 {
        let scaled = (native_gas as u128 * self.numerator as u128).div_ceil(self.denominator as u128);
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    pub fn to_evm_gas_price(&self, native_price: U256) -> U256 {
        native_price.saturating_mul(U256::from(self.denominator)) / U256::from(self.numerator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case::identity(GasScale::V1, 21_000, 21_000)]
    #[case::rounds_up(GasScale { version: 2, numerator: 1, denominator: 3 }, 10, 4)]
    #[case::scales_up(GasScale { version: 3, numerator: 100, denominator: 1 }, 7, 700)]
    #[case::saturates(GasScale { version: 4, numerator: 2, denominator: 1 }, u64::MAX, u64::MAX)]
    fn test_to_evm_gas(#[case] scale: GasScale, #[case] native: u64, #[case] expected: u64) {
        assert_eq!(scale.to_evm_gas(native), expected);
    }

    #[test]
    fn test_fee_is_preserved() {
        let scale = GasScale::new(2, 100, 1).unwrap();
        let native_gas = 1_234u64;
        let native_price = U256::from(1_000_000u64);
        let evm_fee = U256::from(scale.to_evm_gas(native_gas)) * scale.to_evm_gas_price(native_price);
        assert_eq!(evm_fee, U256::from(native_gas) * native_price);
    }

    #[test]
    fn test_rejects_zero_ratio() {
        assert_matches!(GasScale::new(1, 0, 1), Err(CodecError::ValueOutOfRange { .. }));
        assert_matches!(GasScale::new(1, 1, 0), Err(CodecError::ValueOutOfRange { .. }));
    }
}
