use crate::address_to_felt;
use alloy::primitives::Address;
use starknet_core::utils::get_contract_address;
use starknet_types_core::felt::Felt;

/// Deterministic mapping from an Ethereum address to the address of its account contract on the native chain.
///
/// The account is deployed by the execution contract with the Ethereum address as salt and no constructor
/// calldata, so its address follows from the Starknet contract address formula alone. Nothing is stored: any
/// component can recompute the mapping from the two chain parameters held here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMapping {
    execution_contract: Felt,
    account_class_hash: Felt,
}

impl AddressMapping {
    pub fn new(execution_contract: Felt, account_class_hash: Felt) -> Self {
        Self { execution_contract, account_class_hash }
    }

    pub fn execution_contract(&self) -> Felt {
        self.execution_contract
    }

    pub fn account_class_hash(&self) -> Felt {
        self.account_class_hash
    }

    pub fn native_address(&self, address: Address) -> Felt {
        get_contract_address(address_to_felt(address), self.account_class_hash, &[], self.execution_contract)
    }

    /// Checks a candidate reverse mapping by recomputing the forward one.
    pub fn is_mapping_of(&self, address: Address, native: Felt) -> bool {
        self.native_address(address) == native
    }
}
