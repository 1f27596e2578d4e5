//! `eth_sendRawTransaction`: signed Ethereum transactions carried by native invokes.
//!
//! # Accounts
//!
//! Every Ethereum sender executes through its mapped native account, which may not exist yet. Submission is a
//! two-phase protocol: deploy the account if it is absent, then invoke it. The first phase runs inside a critical
//! section per sender, so that concurrent submissions from a new sender deploy its account exactly once. The
//! accepted deploy is recorded in a [`DeployTicket`], keyed by the nonce of the transaction which triggered it.
//!
//! A ticket only stands while its deploy is in flight. A deploy which reverted, was rejected, or is unknown to the
//! native node is retried by the next submission. Once the account is visible on chain the ticket and the
//! critical section of its sender are dropped.
//!
//! Deploys are submitted by a funded deployer account. Its own nonce is read and used under a separate lock.

use crate::{AdapterConfig, EthAdapter, ExecError, ExecResult};
use alloy::consensus::{Transaction as _, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use dashmap::DashMap;
use ec_native_client::{
    BlockId as NativeBlockId, BroadcastedInvokeV1, NativeClient, NativeClientError, INSUFFICIENT_ACCOUNT_BALANCE,
    INVALID_TRANSACTION_NONCE, VALIDATION_FAILURE,
};
use ep_block::envelope::{recover_sender, signing_payload, EvmSignature};
use ep_block::execution::{encode_deploy_calldata, encode_execute_calldata};
use ep_block::{Address, Bytes, B256};
use starknet_core::crypto::ecdsa_sign;
use starknet_types_core::felt::Felt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// An accepted account deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployTicket {
    /// Nonce of the sender's transaction which triggered the deploy.
    pub nonce: u64,
    /// Native hash of the deploy invoke.
    pub transaction_hash: Felt,
}

/// Maps submission rejections caused by the transaction itself onto invalid params.
fn rejection(err: NativeClientError) -> ExecError {
    match &err {
        NativeClientError::Rpc { code, message, data }
            if matches!(*code, INVALID_TRANSACTION_NONCE | INSUFFICIENT_ACCOUNT_BALANCE | VALIDATION_FAILURE) =>
        {
            match data {
                Some(data) => ExecError::InvalidParams(format!("{message}: {data}")),
                None => ExecError::InvalidParams(message.clone()),
            }
        }
        _ => err.into(),
    }
}

#[derive(Clone)]
pub(crate) struct Submitter {
    config: Arc<AdapterConfig>,
    native: Arc<dyn NativeClient>,
    deploys: Arc<DashMap<Felt, Arc<Mutex<Option<DeployTicket>>>>>,
    deployer: Arc<Mutex<()>>,
}

impl Submitter {
    pub fn new(config: Arc<AdapterConfig>, native: Arc<dyn NativeClient>) -> Self {
        Self { config, native, deploys: Default::default(), deployer: Default::default() }
    }

    /// The deploy of `account` submitted by this adapter, while it is not confirmed on chain.
    pub fn deploy_ticket(&self, account: Felt) -> Option<DeployTicket> {
        let section = self.deploys.get(&account).map(|entry| Arc::clone(&entry))?;
        let ticket = section.try_lock().ok()?;
        *ticket
    }

    async fn submit(self, from: Address, account: Felt, nonce: u64, invoke: BroadcastedInvokeV1) -> ExecResult<Felt> {
        self.ensure_account(from, account, nonce).await?;
        self.native.add_invoke_transaction(invoke).await.map_err(rejection)
    }

    /// Deploys the account of `from` unless it exists or a deploy is in flight for it.
    async fn ensure_account(&self, from: Address, account: Felt, nonce: u64) -> ExecResult<()> {
        let section = Arc::clone(&self.deploys.entry(account).or_default());
        let mut ticket = section.lock().await;

        if self.native.get_class_hash_at(NativeBlockId::Pending, account).await?.is_some() {
            *ticket = None;
            drop(ticket);
            self.deploys.remove_if(&account, |_, entry| Arc::ptr_eq(entry, &section));
            return Ok(());
        }

        if let Some(previous) = *ticket {
            let status = self.native.get_transaction_status(previous.transaction_hash).await?;
            if status.is_some_and(|status| status.is_in_flight()) {
                tracing::debug!(
                    "Account of {from} being deployed by {:#x} for nonce {}",
                    previous.transaction_hash,
                    previous.nonce
                );
                return Ok(());
            }
            tracing::warn!(
                "Deploy {:#x} of the account of {from} did not go through ({status:?}), deploying again",
                previous.transaction_hash
            );
            *ticket = None;
        }

        let transaction_hash = self.deploy(from).await?;
        tracing::info!("🧑 Deployed account {account:#x} for {from} ({transaction_hash:#x})");
        *ticket = Some(DeployTicket { nonce, transaction_hash });
        Ok(())
    }

    async fn deploy(&self, address: Address) -> ExecResult<Felt> {
        let _deployer = self.deployer.lock().await;
        let deployer = &self.config.deployer;
        let chain = &self.config.chain;

        let nonce = self.native.get_nonce(NativeBlockId::Pending, deployer.address).await?;
        let mut invoke = BroadcastedInvokeV1 {
            sender_address: deployer.address,
            calldata: encode_deploy_calldata(chain.execution_contract, address),
            max_fee: chain.max_fee,
            signature: vec![],
            nonce,
            is_query: false,
        };
        let hash = invoke.transaction_hash(chain.native_chain_id);
        let signature = ecdsa_sign(&deployer.private_key, &hash)
            .map_err(|err| ExecError::Internal(format!("Signing the account deploy: {err}")))?;
        invoke.signature = vec![signature.r, signature.s];

        Ok(self.native.add_invoke_transaction(invoke).await?)
    }
}

impl EthAdapter {
    /// `eth_sendRawTransaction`. Returns the Ethereum hash of the transaction once the native chain accepted it,
    /// without waiting for inclusion.
    pub async fn send_raw_transaction(&self, raw: Bytes) -> ExecResult<B256> {
        let mut buf = raw.as_ref();
        let envelope = TxEnvelope::decode_2718(&mut buf)
            .map_err(|err| ExecError::InvalidParams(format!("Invalid transaction encoding: {err}")))?;
        if !buf.is_empty() {
            return Err(ExecError::InvalidParams("Trailing bytes after the transaction".to_string()));
        }

        match envelope.chain_id() {
            Some(chain_id) if chain_id == self.config.chain.chain_id => {}
            Some(chain_id) => {
                return Err(ExecError::InvalidParams(format!(
                    "Invalid chain id {chain_id}, expected {}",
                    self.config.chain.chain_id
                )))
            }
            None => {
                return Err(ExecError::InvalidParams("Only replay-protected (EIP-155) transactions are accepted".into()))
            }
        }

        let from = recover_sender(&envelope).map_err(|err| ExecError::InvalidParams(err.to_string()))?;
        let payload = signing_payload(&envelope).map_err(|err| ExecError::InvalidParams(err.to_string()))?;
        let account = self.address_book.native_address(from);
        let nonce = envelope.nonce();
        let invoke = BroadcastedInvokeV1 {
            sender_address: account,
            calldata: encode_execute_calldata(self.config.chain.execution_contract, &payload),
            max_fee: self.config.chain.max_fee,
            signature: EvmSignature::from_envelope(&envelope).to_felts(),
            nonce: Felt::from(nonce),
            is_query: false,
        };
        let hash = *envelope.tx_hash();

        // Runs to completion even when the caller goes away.
        let native_hash = tokio::spawn(self.submitter.clone().submit(from, account, nonce, invoke))
            .await
            .map_err(|err| ExecError::Internal(format!("Submission task failed: {err}")))??;

        tracing::debug!("Submitted {hash} from {from} as {native_hash:#x}");
        Ok(hash)
    }

    pub fn deploy_ticket(&self, address: Address) -> Option<DeployTicket> {
        self.submitter.deploy_ticket(self.address_book.native_address(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_rejections_are_invalid_params() {
        let err = NativeClientError::Rpc {
            code: INVALID_TRANSACTION_NONCE,
            message: "Invalid transaction nonce".to_string(),
            data: None,
        };
        assert_eq!(rejection(err), ExecError::InvalidParams("Invalid transaction nonce".to_string()));

        let err = NativeClientError::Rpc {
            code: VALIDATION_FAILURE,
            message: "Account validation failed".to_string(),
            data: Some("bad signature".to_string()),
        };
        assert_eq!(rejection(err), ExecError::InvalidParams("Account validation failed: bad signature".to_string()));

        let err = NativeClientError::BackendUnavailable { method: "x", attempts: 3, message: "down".to_string() };
        assert_matches!(rejection(err), ExecError::BackendUnavailable(_));
    }
}
