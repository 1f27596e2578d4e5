use anyhow::{anyhow, Context};
use ec_exec::{ChainConfig, DeployerConfig, DEFAULT_BLOCK_GAS_LIMIT};
use ep_convert::GasScale;
use serde::{Deserialize, Serialize};
use starknet_core::utils::cairo_short_string_to_felt;
use starknet_types_core::felt::Felt;

/// Parses a field element, either `0x`-prefixed hex or decimal.
pub fn parse_felt(s: &str) -> anyhow::Result<Felt> {
    let s = s.trim();
    let felt = if s.starts_with("0x") {
        Felt::from_hex(s).ok()
    } else if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        Felt::from_dec_str(s).ok()
    } else {
        None
    };
    felt.ok_or_else(|| anyhow!("Invalid field element: {s:?}"))
}

/// Parameters of the execution layer deployed on the native chain. They have no defaults: a node pointed at the
/// wrong contracts would serve another chain's state.
#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct ChainParams {
    /// Address of the execution contract on the native chain.
    #[arg(env = "ETHANE_EXECUTION_CONTRACT_ADDRESS", long, value_parser = parse_felt, value_name = "FELT")]
    pub execution_contract_address: Option<Felt>,

    /// Class hash of the account proxy, used to derive the native address of an Ethereum address.
    #[arg(env = "ETHANE_ACCOUNT_CLASS_HASH", long, value_parser = parse_felt, value_name = "FELT")]
    pub account_class_hash: Option<Felt>,

    /// ERC20 contract holding native balances.
    #[arg(env = "ETHANE_FEE_TOKEN_ADDRESS", long, value_parser = parse_felt, value_name = "FELT")]
    pub fee_token_address: Option<Felt>,

    /// Ethereum chain id, as reported by `eth_chainId` and checked on submitted transactions.
    #[arg(env = "ETHANE_CHAIN_ID", long, value_name = "CHAIN ID")]
    pub chain_id: Option<u64>,

    /// Native chain id as a Cairo short string, for instance `SN_SEPOLIA`.
    #[arg(env = "ETHANE_NATIVE_CHAIN_ID", long, value_name = "SHORT STRING")]
    pub native_chain_id: Option<String>,

    /// Funded native account deploying user accounts on first use.
    #[arg(env = "ETHANE_DEPLOYER_ADDRESS", long, value_parser = parse_felt, value_name = "FELT")]
    pub deployer_address: Option<Felt>,

    /// Private key of the deployer account.
    #[arg(env = "ETHANE_DEPLOYER_PRIVATE_KEY", long, value_parser = parse_felt, value_name = "FELT", hide_env_values = true)]
    pub deployer_private_key: Option<Felt>,

    /// Version recorded in receipts for the gas scale below. Bump it whenever the ratio changes.
    #[arg(env = "ETHANE_GAS_SCALE_VERSION", long, default_value_t = GasScale::V1.version)]
    pub gas_scale_version: u32,

    #[arg(env = "ETHANE_GAS_SCALE_NUMERATOR", long, default_value_t = GasScale::V1.numerator)]
    pub gas_scale_numerator: u64,

    #[arg(env = "ETHANE_GAS_SCALE_DENOMINATOR", long, default_value_t = GasScale::V1.denominator)]
    pub gas_scale_denominator: u64,

    /// `max_fee` of the native invokes built from submitted transactions.
    #[arg(env = "ETHANE_MAX_FEE", long, value_parser = parse_felt, value_name = "FELT")]
    pub max_fee: Option<Felt>,

    /// Gas limit reported for every block.
    #[arg(env = "ETHANE_BLOCK_GAS_LIMIT", long, default_value_t = DEFAULT_BLOCK_GAS_LIMIT)]
    pub block_gas_limit: u64,
}

fn required<T: Clone>(value: &Option<T>, flag: &str) -> anyhow::Result<T> {
    value.clone().with_context(|| format!("Missing required chain parameter --{flag}"))
}

impl ChainParams {
    pub fn chain_config(&self) -> anyhow::Result<ChainConfig> {
        let native_chain_id = required(&self.native_chain_id, "native-chain-id")?;
        let native_chain_id = cairo_short_string_to_felt(&native_chain_id)
            .with_context(|| format!("Native chain id {native_chain_id:?} is not a valid short string"))?;
        let gas_scale = GasScale::new(self.gas_scale_version, self.gas_scale_numerator, self.gas_scale_denominator)
            .context("Invalid gas scale")?;

        Ok(ChainConfig {
            chain_id: required(&self.chain_id, "chain-id")?,
            native_chain_id,
            execution_contract: required(&self.execution_contract_address, "execution-contract-address")?,
            account_class_hash: required(&self.account_class_hash, "account-class-hash")?,
            fee_token: required(&self.fee_token_address, "fee-token-address")?,
            gas_scale,
            max_fee: required(&self.max_fee, "max-fee")?,
            block_gas_limit: self.block_gas_limit,
        })
    }

    pub fn deployer_config(&self) -> anyhow::Result<DeployerConfig> {
        Ok(DeployerConfig {
            address: required(&self.deployer_address, "deployer-address")?,
            private_key: required(&self.deployer_private_key, "deployer-private-key")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0x1f", Felt::from(31u8))]
    #[case("31", Felt::from(31u8))]
    #[case(" 0xff ", Felt::from(255u8))]
    fn test_parse_felt(#[case] input: &str, #[case] expected: Felt) {
        assert_eq!(parse_felt(input).unwrap(), expected);
    }

    #[rstest]
    #[case("0xzz")]
    #[case("-1")]
    #[case("")]
    fn test_parse_felt_rejects(#[case] input: &str) {
        assert!(parse_felt(input).is_err());
    }
}
