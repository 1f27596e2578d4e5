use crate::ExecResult;
use ec_native_client::{BlockId, FunctionCall, NativeClient, NativeClientError, CONTRACT_NOT_FOUND};
use ep_block::execution::GET_EVM_ADDRESS;
use ep_block::Address;
use ep_convert::{felt_to_address, AddressMapping};
use lru::LruCache;
use starknet_types_core::felt::Felt;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_ADDRESS_BOOK_CAPACITY: usize = 16_384;

/// Memoized address mapping in both directions, keeping the most recently used entries.
///
/// The forward direction is a pure function of the chain parameters. Reverse entries are only ever trusted after
/// recomputing the forward mapping, so a stale or poisoned entry can never be returned.
pub struct AddressBook {
    mapping: AddressMapping,
    forward: Mutex<LruCache<Address, Felt>>,
    reverse: Mutex<LruCache<Felt, Address>>,
}

fn lock<T>(cache: &Mutex<T>) -> MutexGuard<'_, T> {
    // entries are plain values, nothing to repair after a panic
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AddressBook {
    pub fn new(mapping: AddressMapping) -> Self {
        Self::with_capacity(mapping, DEFAULT_ADDRESS_BOOK_CAPACITY)
    }

    /// Keeps at most `capacity` entries in each direction.
    pub fn with_capacity(mapping: AddressMapping, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { mapping, forward: Mutex::new(LruCache::new(capacity)), reverse: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn mapping(&self) -> &AddressMapping {
        &self.mapping
    }

    pub fn native_address(&self, address: Address) -> Felt {
        if let Some(native) = lock(&self.forward).get(&address) {
            return *native;
        }
        let native = self.mapping.native_address(address);
        self.remember(address, native);
        native
    }

    fn remember(&self, address: Address, native: Felt) {
        lock(&self.forward).put(address, native);
        lock(&self.reverse).put(native, address);
    }

    /// Ethereum address owning the native account `native_address`, or [`None`] if it is not an account deployed
    /// for an Ethereum address.
    pub async fn evm_address(&self, native: &dyn NativeClient, native_address: Felt) -> ExecResult<Option<Address>> {
        let memo = lock(&self.reverse).get(&native_address).copied();
        if let Some(address) = memo {
            if self.mapping.is_mapping_of(address, native_address) {
                return Ok(Some(address));
            }
            tracing::warn!("Dropping inconsistent address book entry {native_address:#x} -> {address}");
            lock(&self.reverse).pop(&native_address);
        }

        let request =
            FunctionCall { contract_address: native_address, entry_point_selector: *GET_EVM_ADDRESS, calldata: vec![] };
        let felts = match native.call(request, BlockId::Latest).await {
            Ok(felts) => felts,
            Err(NativeClientError::ContractError { .. }) => return Ok(None),
            Err(err) if err.code() == Some(CONTRACT_NOT_FOUND) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let Some(Ok(address)) = felts.first().map(felt_to_address) else {
            return Ok(None);
        };
        if !self.mapping.is_mapping_of(address, native_address) {
            return Ok(None);
        }
        self.remember(address, native_address);
        Ok(Some(address))
    }
}
