//! An in-memory native chain for tests.
//!
//! [`FakeNativeChain`] keeps accounts, balances and mined blocks, and understands just enough of the execution
//! contract to deploy accounts and run `eth_send_transaction` payloads through a user-supplied handler. Submitted
//! invokes land in a pending list until [`FakeNativeChain::mine`] is called.

use crate::{
    BlockHashAndNumber, BlockId, BlockWithTxHashes, BroadcastedInvokeV1, ExecutionStatus, FeeEstimate, FinalityStatus,
    FunctionCall, NativeBlock, NativeBlockHeader, NativeClient, NativeClientError, NativeEvent, NativeReceipt,
    NativeResult, NativeTransaction, ResourcePrice, TransactionStatus, TransactionWithReceipt, CONTRACT_NOT_FOUND,
    INVALID_TRANSACTION_NONCE, VALIDATION_FAILURE,
};
use async_trait::async_trait;
use ep_block::execution::{
    decode_deploy_calldata, decode_execute_calldata, EvmLogEvent, ExecutionOutcome, TransactionExecutedEvent,
    BALANCE_OF, BYTECODE, GET_EVM_ADDRESS, STORAGE,
};
use ep_block::{Address, U256};
use ep_convert::{address_to_felt, join_u256, split_u256, AddressMapping};
use starknet_core::crypto::{ecdsa_verify, Signature};
use starknet_types_core::felt::Felt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub const FAKE_CHAIN_ID: Felt = Felt::from_hex_unchecked("0x534e5f4554484f4e45"); // SN_ETHANE

/// What the execution contract does with an `eth_send_transaction` payload.
#[derive(Debug, Clone, Default)]
pub struct FakeExecution {
    pub return_data: Vec<u8>,
    /// EVM-level success, reported in the `transaction_executed` event.
    pub success: bool,
    pub native_gas_used: u64,
    pub created_address: Option<Address>,
    pub logs: Vec<EvmLogEvent>,
    /// When set, the invoke itself reverts on the native chain and emits nothing.
    pub native_revert: Option<String>,
}

impl FakeExecution {
    pub fn success(return_data: Vec<u8>, logs: Vec<EvmLogEvent>) -> Self {
        Self { return_data, success: true, native_gas_used: 21_000, logs, ..Default::default() }
    }
}

pub type InvokeHandler = Arc<dyn Fn(&[u8], &BroadcastedInvokeV1) -> FakeExecution + Send + Sync>;
pub type ViewHandler = Arc<dyn Fn(&[Felt]) -> NativeResult<Vec<Felt>> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct FakeAccount {
    pub class_hash: Felt,
    pub nonce: u64,
    pub evm_address: Option<Address>,
    pub bytecode: Vec<u8>,
    pub storage: HashMap<U256, U256>,
}

struct Deployer {
    address: Felt,
    public_key: Felt,
}

struct State {
    accounts: HashMap<Felt, FakeAccount>,
    balances: HashMap<(Felt, Felt), U256>,
    views: HashMap<(Felt, Felt), ViewHandler>,
    invoke_handler: Option<InvokeHandler>,
    deployer: Option<Deployer>,
    blocks: Vec<NativeBlock>,
    pending: Vec<TransactionWithReceipt>,
    submitted: Vec<BroadcastedInvokeV1>,
    statuses: HashMap<Felt, TransactionStatus>,
    /// Revert reasons of the next account deploys.
    deploy_reverts: Vec<String>,
    failures: Vec<NativeClientError>,
    fork: u64,
    gas_price: Felt,
    fee_estimate: FeeEstimate,
    calls: u64,
}

pub struct FakeNativeChain {
    mapping: AddressMapping,
    state: Mutex<State>,
}

impl FakeNativeChain {
    /// A chain with an empty genesis block.
    pub fn new(mapping: AddressMapping) -> Self {
        let chain = Self {
            mapping,
            state: Mutex::new(State {
                accounts: HashMap::new(),
                balances: HashMap::new(),
                views: HashMap::new(),
                invoke_handler: None,
                deployer: None,
                blocks: Vec::new(),
                pending: Vec::new(),
                submitted: Vec::new(),
                statuses: HashMap::new(),
                deploy_reverts: Vec::new(),
                failures: Vec::new(),
                fork: 0,
                gas_price: Felt::from(1_000_000_000u64),
                fee_estimate: FeeEstimate {
                    gas_consumed: Felt::from(21_000u64),
                    gas_price: Felt::from(1_000_000_000u64),
                    data_gas_consumed: Felt::ZERO,
                    data_gas_price: Felt::ZERO,
                    overall_fee: Felt::from(21_000_000_000_000u64),
                },
                calls: 0,
            }),
        };
        chain.mine();
        chain
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("Poisoned lock")
    }

    pub fn mapping(&self) -> AddressMapping {
        self.mapping
    }

    /// Registers a funded account allowed to submit deploys. Its signatures are checked against `public_key`.
    pub fn with_deployer(self, address: Felt, public_key: Felt) -> Self {
        {
            let mut state = self.state();
            state.accounts.insert(address, FakeAccount { class_hash: Felt::from(0xde91u64), ..Default::default() });
            state.deployer = Some(Deployer { address, public_key });
        }
        self
    }

    pub fn on_invoke(&self, handler: impl Fn(&[u8], &BroadcastedInvokeV1) -> FakeExecution + Send + Sync + 'static) {
        self.state().invoke_handler = Some(Arc::new(handler));
    }

    pub fn on_view(
        &self,
        contract: Felt,
        selector: Felt,
        handler: impl Fn(&[Felt]) -> NativeResult<Vec<Felt>> + Send + Sync + 'static,
    ) {
        self.state().views.insert((contract, selector), Arc::new(handler));
    }

    /// Deploys the account of `address` directly, without going through the deployer.
    pub fn deploy_account(&self, address: Address) -> Felt {
        let native = self.mapping.native_address(address);
        self.state().accounts.insert(
            native,
            FakeAccount { class_hash: self.mapping.account_class_hash(), evm_address: Some(address), ..Default::default() },
        );
        native
    }

    pub fn update_account(&self, native: Felt, f: impl FnOnce(&mut FakeAccount)) {
        if let Some(account) = self.state().accounts.get_mut(&native) {
            f(account)
        }
    }

    pub fn account(&self, native: Felt) -> Option<FakeAccount> {
        self.state().accounts.get(&native).cloned()
    }

    pub fn set_balance(&self, token: Felt, account: Felt, balance: U256) {
        self.state().balances.insert((token, account), balance);
    }

    pub fn set_gas_price(&self, gas_price: Felt) {
        self.state().gas_price = gas_price;
    }

    pub fn set_fee_estimate(&self, fee_estimate: FeeEstimate) {
        self.state().fee_estimate = fee_estimate;
    }

    /// Makes the next account deploy revert: it is accepted and consumes the deployer's nonce, but no account
    /// comes out of it.
    pub fn revert_next_deploy(&self, reason: &str) {
        self.state().deploy_reverts.push(reason.to_string());
    }

    /// Queues errors returned, in order, by the next native calls.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = NativeClientError>) {
        self.state().failures.extend(errors);
    }

    /// Every invoke accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<BroadcastedInvokeV1> {
        self.state().submitted.clone()
    }

    /// Number of accepted invokes deploying the account of `address`.
    pub fn deploy_count(&self, address: Address) -> usize {
        let execution_contract = self.mapping.execution_contract();
        self.state()
            .submitted
            .iter()
            .filter(|tx| decode_deploy_calldata(execution_contract, &tx.calldata) == Some(address))
            .count()
    }

    /// Number of native calls served, failures included.
    pub fn calls(&self) -> u64 {
        self.state().calls
    }

    pub fn head(&self) -> NativeBlockHeader {
        let state = self.state();
        state.blocks.last().map(|block| block.header.clone()).expect("Genesis is always present")
    }

    pub fn block(&self, number: u64) -> Option<NativeBlock> {
        self.state().blocks.get(number as usize).cloned()
    }

    /// Closes a block with every pending transaction.
    pub fn mine(&self) -> NativeBlockHeader {
        let mut state = self.state();
        let number = state.blocks.len() as u64;
        let parent_hash = state.blocks.last().map(|block| block.header.block_hash).unwrap_or(Felt::ZERO);
        let header = NativeBlockHeader {
            block_hash: fake_block_hash(number, state.fork),
            parent_hash,
            block_number: number,
            timestamp: 1_700_000_000 + number,
            sequencer_address: Felt::from(0x5e9u64),
            l1_gas_price: ResourcePrice { price_in_fri: Felt::ZERO, price_in_wei: state.gas_price },
        };
        let transactions = std::mem::take(&mut state.pending);
        for tx in &transactions {
            if let Some(status) = state.statuses.get_mut(&tx.receipt.transaction_hash) {
                status.finality_status = FinalityStatus::AcceptedOnL2;
                status.execution_status = Some(tx.receipt.execution_status);
            }
        }
        state.blocks.push(NativeBlock { header: header.clone(), transactions });
        header
    }

    /// Drops every block above `number` and switches to a new fork, so the next mined blocks get new hashes.
    pub fn reorg_to(&self, number: u64) {
        let mut state = self.state();
        state.blocks.truncate(number as usize + 1);
        state.fork += 1;
    }

    fn enter(&self) -> NativeResult<MutexGuard<'_, State>> {
        let mut state = self.state();
        state.calls += 1;
        if !state.failures.is_empty() {
            return Err(state.failures.remove(0));
        }
        Ok(state)
    }

    fn run_view(&self, state: &State, request: &FunctionCall) -> NativeResult<Vec<Felt>> {
        if let Some(handler) = state.views.get(&(request.contract_address, request.entry_point_selector)) {
            return handler(&request.calldata);
        }
        if request.entry_point_selector == *BALANCE_OF {
            let account = request.calldata.first().copied().unwrap_or_default();
            let balance = state.balances.get(&(request.contract_address, account)).copied().unwrap_or_default();
            return Ok(split_u256(balance).to_vec());
        }

        let Some(account) = state.accounts.get(&request.contract_address) else {
            return Err(NativeClientError::Rpc {
                code: CONTRACT_NOT_FOUND,
                message: "Contract not found".to_string(),
                data: None,
            });
        };
        let selector = request.entry_point_selector;
        if selector == *GET_EVM_ADDRESS {
            return Ok(vec![account.evm_address.map(address_to_felt).unwrap_or_default()]);
        }
        if selector == *BYTECODE {
            let mut felts = vec![Felt::from(account.bytecode.len())];
            felts.extend(account.bytecode.iter().map(|byte| Felt::from(*byte)));
            return Ok(felts);
        }
        if selector == *STORAGE {
            let [low, high] = request.calldata.as_slice() else {
                return Err(contract_error("storage expects a Uint256 key"));
            };
            let key = join_u256(low, high).map_err(|err| contract_error(&err.to_string()))?;
            return Ok(split_u256(account.storage.get(&key).copied().unwrap_or_default()).to_vec());
        }
        Err(contract_error("Entry point not found"))
    }

    fn accept(&self, state: &mut State, tx: &BroadcastedInvokeV1) -> NativeResult<Felt> {
        let Some(account) = state.accounts.get(&tx.sender_address) else {
            return Err(NativeClientError::Rpc {
                code: VALIDATION_FAILURE,
                message: "Account validation failed".to_string(),
                data: Some("account is not deployed".to_string()),
            });
        };
        if Felt::from(account.nonce) != tx.nonce {
            return Err(NativeClientError::Rpc {
                code: INVALID_TRANSACTION_NONCE,
                message: "Invalid transaction nonce".to_string(),
                data: None,
            });
        }

        let execution_contract = self.mapping.execution_contract();
        let deploy = decode_deploy_calldata(execution_contract, &tx.calldata);
        if let Some(deployer) = &state.deployer {
            if tx.sender_address == deployer.address {
                let [r, s] = tx.signature.as_slice() else {
                    return Err(validation_failure("deployer signature must be [r, s]"));
                };
                let hash = tx.transaction_hash(FAKE_CHAIN_ID);
                if !matches!(ecdsa_verify(&deployer.public_key, &hash, &Signature { r: *r, s: *s }), Ok(true)) {
                    return Err(validation_failure("invalid deployer signature"));
                }
            } else if deploy.is_some() {
                return Err(validation_failure("only the deployer may deploy accounts"));
            }
        }

        let hash = Felt::from(0xfa4e_0000u64 + state.submitted.len() as u64);
        let mut receipt =
            NativeReceipt { transaction_hash: hash, execution_status: ExecutionStatus::Succeeded, revert_reason: None, events: vec![] };

        if let Some(address) = deploy {
            if state.deploy_reverts.is_empty() {
                let native = self.mapping.native_address(address);
                state.accounts.entry(native).or_insert_with(|| FakeAccount {
                    class_hash: self.mapping.account_class_hash(),
                    evm_address: Some(address),
                    ..Default::default()
                });
            } else {
                receipt.execution_status = ExecutionStatus::Reverted;
                receipt.revert_reason = Some(state.deploy_reverts.remove(0));
            }
        } else if let Some(Ok(payload)) = decode_execute_calldata(execution_contract, &tx.calldata) {
            let execution = match &state.invoke_handler {
                Some(handler) => handler(&payload, tx),
                None => FakeExecution::success(vec![], vec![]),
            };
            match execution.native_revert {
                Some(reason) => {
                    receipt.execution_status = ExecutionStatus::Reverted;
                    receipt.revert_reason = Some(reason);
                }
                None => {
                    for log in &execution.logs {
                        receipt.events.push(NativeEvent { from_address: execution_contract, keys: log.keys(), data: log.data() });
                    }
                    let executed = TransactionExecutedEvent {
                        outcome: ExecutionOutcome {
                            return_data: execution.return_data,
                            success: execution.success,
                            native_gas_used: execution.native_gas_used,
                        },
                        created_address: execution.created_address,
                    };
                    receipt.events.push(NativeEvent { from_address: execution_contract, keys: executed.keys(), data: executed.data() });
                }
            }
        }

        if let Some(account) = state.accounts.get_mut(&tx.sender_address) {
            account.nonce += 1;
        }
        let status = match receipt.execution_status {
            ExecutionStatus::Succeeded => {
                TransactionStatus { finality_status: FinalityStatus::Received, execution_status: None }
            }
            ExecutionStatus::Reverted => TransactionStatus {
                finality_status: FinalityStatus::AcceptedOnL2,
                execution_status: Some(ExecutionStatus::Reverted),
            },
        };
        state.statuses.insert(hash, status);
        state.submitted.push(tx.clone());
        state.pending.push(TransactionWithReceipt {
            transaction: NativeTransaction {
                tx_type: "INVOKE".to_string(),
                version: Some(tx.version()),
                sender_address: Some(tx.sender_address),
                calldata: tx.calldata.clone(),
                signature: tx.signature.clone(),
                nonce: Some(tx.nonce),
            },
            receipt,
        });
        Ok(hash)
    }

    fn resolve(state: &State, block_id: BlockId) -> Option<&NativeBlock> {
        match block_id {
            BlockId::Latest | BlockId::Pending => state.blocks.last(),
            BlockId::Number(number) => state.blocks.get(number as usize),
            BlockId::Hash(hash) => state.blocks.iter().find(|block| block.header.block_hash == hash),
        }
    }
}

fn fake_block_hash(number: u64, fork: u64) -> Felt {
    Felt::from(0xb10c_0000_0000u64 + (fork << 32) + number)
}

fn contract_error(reason: &str) -> NativeClientError {
    NativeClientError::ContractError { revert_error: reason.to_string() }
}

fn validation_failure(reason: &str) -> NativeClientError {
    NativeClientError::Rpc {
        code: VALIDATION_FAILURE,
        message: "Account validation failed".to_string(),
        data: Some(reason.to_string()),
    }
}

#[async_trait]
impl NativeClient for FakeNativeChain {
    async fn chain_id(&self) -> NativeResult<Felt> {
        self.enter()?;
        Ok(FAKE_CHAIN_ID)
    }

    async fn block_hash_and_number(&self) -> NativeResult<BlockHashAndNumber> {
        let state = self.enter()?;
        let head = state.blocks.last().map(|block| &block.header).expect("Genesis is always present");
        Ok(BlockHashAndNumber { block_hash: head.block_hash, block_number: head.block_number })
    }

    async fn get_nonce(&self, _block_id: BlockId, contract_address: Felt) -> NativeResult<Felt> {
        let state = self.enter()?;
        match state.accounts.get(&contract_address) {
            Some(account) => Ok(Felt::from(account.nonce)),
            None => Err(NativeClientError::Rpc { code: CONTRACT_NOT_FOUND, message: "Contract not found".to_string(), data: None }),
        }
    }

    async fn get_class_hash_at(&self, _block_id: BlockId, contract_address: Felt) -> NativeResult<Option<Felt>> {
        let state = self.enter()?;
        Ok(state.accounts.get(&contract_address).map(|account| account.class_hash))
    }

    async fn call(&self, request: FunctionCall, _block_id: BlockId) -> NativeResult<Vec<Felt>> {
        let state = self.enter()?;
        self.run_view(&state, &request)
    }

    async fn estimate_fee(&self, transaction: BroadcastedInvokeV1, _block_id: BlockId) -> NativeResult<FeeEstimate> {
        let state = self.enter()?;
        if !state.accounts.contains_key(&transaction.sender_address) {
            return Err(contract_error("sender account is not deployed"));
        }
        Ok(state.fee_estimate.clone())
    }

    async fn add_invoke_transaction(&self, transaction: BroadcastedInvokeV1) -> NativeResult<Felt> {
        let mut state = self.enter()?;
        self.accept(&mut state, &transaction)
    }

    async fn get_transaction_status(&self, transaction_hash: Felt) -> NativeResult<Option<TransactionStatus>> {
        let state = self.enter()?;
        Ok(state.statuses.get(&transaction_hash).copied())
    }

    async fn get_block_with_tx_hashes(&self, block_id: BlockId) -> NativeResult<Option<BlockWithTxHashes>> {
        let state = self.enter()?;
        Ok(Self::resolve(&state, block_id).map(|block| BlockWithTxHashes {
            header: block.header.clone(),
            transactions: block.transactions.iter().map(|tx| tx.receipt.transaction_hash).collect(),
        }))
    }

    async fn get_block_with_receipts(&self, block_id: BlockId) -> NativeResult<Option<NativeBlock>> {
        let state = self.enter()?;
        Ok(Self::resolve(&state, block_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ep_block::execution::{encode_deploy_calldata, encode_execute_calldata};

    fn chain() -> FakeNativeChain {
        FakeNativeChain::new(AddressMapping::new(Felt::from(0xec0u64), Felt::from(0xacc0u64)))
    }

    #[tokio::test]
    async fn test_mine_links_blocks() {
        let chain = chain();
        let first = chain.mine();
        let second = chain.mine();
        assert_eq!(second.parent_hash, first.block_hash);
        assert_eq!(chain.block_hash_and_number().await.unwrap().block_number, 2);

        chain.reorg_to(1);
        let replaced = chain.mine();
        assert_eq!(replaced.block_number, 2);
        assert_eq!(replaced.parent_hash, first.block_hash);
        assert_ne!(replaced.block_hash, second.block_hash);
    }

    #[tokio::test]
    async fn test_deploy_then_execute() {
        let chain = chain();
        let deployer = Felt::from(0xd00u64);
        chain.state().accounts.insert(deployer, FakeAccount::default());
        let address = Address::with_last_byte(0x11);
        let native = chain.mapping().native_address(address);

        assert_eq!(chain.get_class_hash_at(BlockId::Pending, native).await.unwrap(), None);
        let deploy = BroadcastedInvokeV1 {
            sender_address: deployer,
            calldata: encode_deploy_calldata(Felt::from(0xec0u64), address),
            max_fee: Felt::ZERO,
            signature: vec![],
            nonce: Felt::ZERO,
            is_query: false,
        };
        chain.add_invoke_transaction(deploy).await.unwrap();
        assert_eq!(chain.get_class_hash_at(BlockId::Pending, native).await.unwrap(), Some(Felt::from(0xacc0u64)));
        assert_eq!(chain.deploy_count(address), 1);

        let invoke = BroadcastedInvokeV1 {
            sender_address: native,
            calldata: encode_execute_calldata(Felt::from(0xec0u64), &[0xc0]),
            max_fee: Felt::ZERO,
            signature: vec![],
            nonce: Felt::ZERO,
            is_query: false,
        };
        chain.add_invoke_transaction(invoke.clone()).await.unwrap();
        let err = chain.add_invoke_transaction(invoke).await.unwrap_err();
        assert_eq!(err.code(), Some(INVALID_TRANSACTION_NONCE));

        chain.mine();
        let block = chain.get_block_with_receipts(BlockId::Latest).await.unwrap().unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[1].receipt.events.len(), 1);
    }

    #[tokio::test]
    async fn test_reverted_deploy() {
        let chain = chain();
        let deployer = Felt::from(0xd00u64);
        chain.state().accounts.insert(deployer, FakeAccount::default());
        let address = Address::with_last_byte(0x12);
        chain.revert_next_deploy("Out of gas");

        let deploy = BroadcastedInvokeV1 {
            sender_address: deployer,
            calldata: encode_deploy_calldata(Felt::from(0xec0u64), address),
            max_fee: Felt::ZERO,
            signature: vec![],
            nonce: Felt::ZERO,
            is_query: false,
        };
        let hash = chain.add_invoke_transaction(deploy).await.unwrap();

        let native = chain.mapping().native_address(address);
        assert_eq!(chain.get_class_hash_at(BlockId::Pending, native).await.unwrap(), None);
        let status = chain.get_transaction_status(hash).await.unwrap().unwrap();
        assert_eq!(status.execution_status, Some(ExecutionStatus::Reverted));
        assert!(!status.is_in_flight());
        assert_eq!(chain.get_transaction_status(Felt::from(0x404u64)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_queued_failures() {
        let chain = chain();
        chain.fail_next([NativeClientError::Client("boom".to_string())]);
        assert!(chain.chain_id().await.is_err());
        assert_eq!(chain.chain_id().await.unwrap(), FAKE_CHAIN_ID);
        assert_eq!(chain.calls(), 2);
    }
}
