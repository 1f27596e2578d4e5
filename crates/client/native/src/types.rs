//! Request and response shapes of the native JSON-RPC (v0.7), limited to the fields Ethane reads.

use serde::{Deserialize, Serialize, Serializer};
use starknet_core::crypto::compute_hash_on_elements;
use starknet_types_core::felt::Felt;

/// Transaction version of query-only invokes (`2^128 + 1`), which are never executed on-chain.
pub const QUERY_VERSION_ONE: Felt = Felt::from_hex_unchecked("0x100000000000000000000000000000001");

/// Cairo short string `invoke`.
const PREFIX_INVOKE: Felt = Felt::from_hex_unchecked("0x696e766f6b65");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    Latest,
    Pending,
    Number(u64),
    Hash(Felt),
}

impl Serialize for BlockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Number {
            block_number: u64,
        }
        #[derive(Serialize)]
        struct Hash {
            block_hash: Felt,
        }

        match self {
            Self::Latest => serializer.serialize_str("latest"),
            Self::Pending => serializer.serialize_str("pending"),
            Self::Number(block_number) => Number { block_number: *block_number }.serialize(serializer),
            Self::Hash(block_hash) => Hash { block_hash: *block_hash }.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub contract_address: Felt,
    pub entry_point_selector: Felt,
    pub calldata: Vec<Felt>,
}

/// A signed (or query-only) invoke transaction, version 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastedInvokeV1 {
    pub sender_address: Felt,
    pub calldata: Vec<Felt>,
    pub max_fee: Felt,
    pub signature: Vec<Felt>,
    pub nonce: Felt,
    pub is_query: bool,
}

impl BroadcastedInvokeV1 {
    pub fn version(&self) -> Felt {
        if self.is_query {
            QUERY_VERSION_ONE
        } else {
            Felt::ONE
        }
    }

    /// The invoke v1 transaction hash, which is what the sender's signature covers.
    pub fn transaction_hash(&self, chain_id: Felt) -> Felt {
        compute_hash_on_elements(&[
            PREFIX_INVOKE,
            self.version(),
            self.sender_address,
            Felt::ZERO,
            compute_hash_on_elements(&self.calldata),
            self.max_fee,
            chain_id,
            self.nonce,
        ])
    }
}

impl Serialize for BroadcastedInvokeV1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(rename = "type")]
            tx_type: &'static str,
            sender_address: &'a Felt,
            calldata: &'a [Felt],
            max_fee: &'a Felt,
            version: Felt,
            signature: &'a [Felt],
            nonce: &'a Felt,
        }

        Wire {
            tx_type: "INVOKE",
            sender_address: &self.sender_address,
            calldata: &self.calldata,
            max_fee: &self.max_fee,
            version: self.version(),
            signature: &self.signature,
            nonce: &self.nonce,
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResult {
    pub transaction_hash: Felt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub gas_consumed: Felt,
    pub gas_price: Felt,
    #[serde(default)]
    pub data_gas_consumed: Felt,
    #[serde(default)]
    pub data_gas_price: Felt,
    pub overall_fee: Felt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHashAndNumber {
    pub block_hash: Felt,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourcePrice {
    pub price_in_fri: Felt,
    pub price_in_wei: Felt,
}

/// Header of a closed (non-pending) block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeBlockHeader {
    pub block_hash: Felt,
    pub parent_hash: Felt,
    pub block_number: u64,
    pub timestamp: u64,
    pub sequencer_address: Felt,
    #[serde(default)]
    pub l1_gas_price: ResourcePrice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWithTxHashes {
    #[serde(flatten)]
    pub header: NativeBlockHeader,
    pub transactions: Vec<Felt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Succeeded,
    Reverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalityStatus {
    Received,
    Rejected,
    AcceptedOnL2,
    AcceptedOnL1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub finality_status: FinalityStatus,
    /// Only known once the transaction was executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<ExecutionStatus>,
}

impl TransactionStatus {
    /// Received but not executed yet. It may still succeed.
    pub fn is_in_flight(&self) -> bool {
        self.finality_status == FinalityStatus::Received && self.execution_status != Some(ExecutionStatus::Reverted)
    }
}

/// A transaction as listed in a block. Only invokes carry the fields below, other kinds leave them empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTransaction {
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Felt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<Felt>,
    #[serde(default)]
    pub calldata: Vec<Felt>,
    #[serde(default)]
    pub signature: Vec<Felt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Felt>,
}

impl NativeTransaction {
    pub fn is_invoke(&self) -> bool {
        self.tx_type == "INVOKE"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeEvent {
    pub from_address: Felt,
    pub keys: Vec<Felt>,
    pub data: Vec<Felt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeReceipt {
    pub transaction_hash: Felt,
    pub execution_status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    #[serde(default)]
    pub events: Vec<NativeEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionWithReceipt {
    pub transaction: NativeTransaction,
    pub receipt: NativeReceipt,
}

/// A native block with its transactions and the events they emitted: the unit consumed by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeBlock {
    #[serde(flatten)]
    pub header: NativeBlockHeader,
    pub transactions: Vec<TransactionWithReceipt>,
}
