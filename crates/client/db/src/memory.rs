use crate::{check_commit, CommitOutcome, StoreRead, StoreResult, StoreWrite};
use async_trait::async_trait;
use ep_block::{Block, BlockBundle, ChainHead, Felt, Log, LogFilter, Receipt, Transaction, B256};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// Every bundle ever committed, including tombstoned ones.
    bundles: HashMap<B256, BlockBundle>,
    tombstoned: HashSet<B256>,
    canonical: BTreeMap<u64, B256>,
    head: Option<ChainHead>,
    /// transaction hash => block hashes of the bundles which contain it
    transactions: HashMap<B256, Vec<B256>>,
    native_hashes: HashMap<Felt, Vec<B256>>,
}

impl Inner {
    fn is_canonical(&self, block_hash: &B256) -> bool {
        self.bundles
            .get(block_hash)
            .is_some_and(|bundle| self.canonical.get(&bundle.number()) == Some(block_hash))
    }

    fn canonical_bundle(&self, number: u64) -> Option<&BlockBundle> {
        self.canonical.get(&number).and_then(|hash| self.bundles.get(hash))
    }

    /// Position of `transaction_hash` in the canonical bundle containing it.
    fn locate(&self, transaction_hash: &B256) -> Option<(&BlockBundle, usize)> {
        self.transactions.get(transaction_hash)?.iter().filter(|hash| self.is_canonical(hash)).find_map(|hash| {
            let bundle = self.bundles.get(hash)?;
            let index = bundle.transactions.iter().position(|tx| &tx.hash == transaction_hash)?;
            Some((bundle, index))
        })
    }

    fn retract_above(&mut self, number: u64) {
        let above: Vec<u64> = self.canonical.range(number.saturating_add(1)..).map(|(n, _)| *n).collect();
        for n in above {
            if let Some(hash) = self.canonical.remove(&n) {
                self.tombstoned.insert(hash);
            }
        }
    }
}

/// Store kept in process memory, for tests and ephemeral deployments.
///
/// A single lock guards the whole chain, so each write is trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the block with this hash was superseded by a reorg.
    pub async fn is_tombstoned(&self, hash: B256) -> bool {
        self.inner.read().await.tombstoned.contains(&hash)
    }
}

#[async_trait]
impl StoreRead for MemoryStore {
    async fn head(&self) -> StoreResult<Option<ChainHead>> {
        Ok(self.inner.read().await.head)
    }

    async fn canonical_hash(&self, number: u64) -> StoreResult<Option<B256>> {
        Ok(self.inner.read().await.canonical.get(&number).copied())
    }

    async fn block_by_number(&self, number: u64) -> StoreResult<Option<Block>> {
        Ok(self.inner.read().await.canonical_bundle(number).map(|bundle| bundle.block.clone()))
    }

    async fn block_by_hash(&self, hash: B256) -> StoreResult<Option<Block>> {
        let inner = self.inner.read().await;
        Ok(inner.is_canonical(&hash).then(|| inner.bundles.get(&hash).map(|b| b.block.clone())).flatten())
    }

    async fn block_transactions(&self, block: &Block) -> StoreResult<Vec<Transaction>> {
        let inner = self.inner.read().await;
        if !inner.is_canonical(&block.hash()) {
            return Ok(Vec::new());
        }
        Ok(inner.bundles.get(&block.hash()).map(|bundle| bundle.transactions.clone()).unwrap_or_default())
    }

    async fn transaction(&self, hash: B256) -> StoreResult<Option<Transaction>> {
        let inner = self.inner.read().await;
        Ok(inner.locate(&hash).map(|(bundle, index)| bundle.transactions[index].clone()))
    }

    async fn transaction_by_native_hash(&self, native_hash: Felt) -> StoreResult<Option<Transaction>> {
        let inner = self.inner.read().await;
        let Some(blocks) = inner.native_hashes.get(&native_hash) else { return Ok(None) };
        Ok(blocks
            .iter()
            .filter(|hash| inner.is_canonical(hash))
            .filter_map(|hash| inner.bundles.get(hash))
            .flat_map(|bundle| bundle.transactions.iter())
            .find(|tx| tx.native_hash == native_hash)
            .cloned())
    }

    async fn receipt(&self, transaction_hash: B256) -> StoreResult<Option<Receipt>> {
        let inner = self.inner.read().await;
        Ok(inner.locate(&transaction_hash).map(|(bundle, index)| bundle.receipts[index].clone()))
    }

    async fn logs(&self, filter: &LogFilter) -> StoreResult<Vec<Log>> {
        let inner = self.inner.read().await;
        if filter.from_block > filter.to_block {
            return Ok(Vec::new());
        }
        Ok(inner
            .canonical
            .range(filter.from_block..=filter.to_block)
            .filter_map(|(_, hash)| inner.bundles.get(hash))
            .flat_map(|bundle| bundle.logs())
            .filter(|log| filter.matches(log))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreWrite for MemoryStore {
    async fn commit_block(&self, bundle: &BlockBundle) -> StoreResult<CommitOutcome> {
        let mut inner = self.inner.write().await;
        let number = bundle.number();
        let hash = bundle.hash();

        let current = inner.canonical.get(&number).copied();
        let parent = number.checked_sub(1).and_then(|n| inner.canonical.get(&n).copied());
        if let Some(outcome) = check_commit(bundle, inner.head, current, parent)? {
            return Ok(outcome);
        }

        for tx in &bundle.transactions {
            let blocks = inner.transactions.entry(tx.hash).or_default();
            if !blocks.contains(&hash) {
                blocks.push(hash);
            }
            let blocks = inner.native_hashes.entry(tx.native_hash).or_default();
            if !blocks.contains(&hash) {
                blocks.push(hash);
            }
        }
        inner.bundles.insert(hash, bundle.clone());
        inner.tombstoned.remove(&hash);

        inner.canonical.insert(number, hash);
        inner.head = Some(ChainHead { number, hash });
        if let Some(previous) = current.filter(|previous| *previous != hash) {
            inner.tombstoned.insert(previous);
        }
        inner.retract_above(number);

        Ok(CommitOutcome::Committed)
    }

    async fn rewind(&self, to: Option<u64>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        match to {
            Some(to) => {
                inner.retract_above(to);
                inner.head = inner.canonical.get(&to).map(|hash| ChainHead { number: to, hash: *hash });
            }
            None => {
                let all: Vec<B256> = inner.canonical.values().copied().collect();
                inner.tombstoned.extend(all);
                inner.canonical.clear();
                inner.head = None;
            }
        }
        Ok(())
    }
}
