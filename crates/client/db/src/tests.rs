//! Behaviour shared by every store backend.

use crate::{CommitOutcome, StoreError, StoreWrite};
use assert_matches::assert_matches;
use async_trait::async_trait;
use ep_block::testing::{bundle, fork_bundle, hash, tx_hash};
use ep_block::{Address, ChainHead, Felt, LogFilter, B256};

async fn commit_chain<S: StoreWrite>(store: &S, blocks: impl IntoIterator<Item = u64>, fork: u8) {
    for n in blocks {
        assert_eq!(store.commit_block(&bundle(n, fork)).await.unwrap(), CommitOutcome::Committed);
    }
}

pub(crate) async fn commit_and_read<S: StoreWrite>(store: &S) {
    assert_eq!(store.head().await.unwrap(), None);
    commit_chain(store, 0..=2, 1).await;

    assert_eq!(store.head().await.unwrap(), Some(ChainHead { number: 2, hash: hash(2, 1) }));
    assert_eq!(store.canonical_hash(1).await.unwrap(), Some(hash(1, 1)));

    let block = store.block_by_number(1).await.unwrap().unwrap();
    assert_eq!(block, bundle(1, 1).block);
    assert_eq!(store.block_by_hash(hash(1, 1)).await.unwrap(), Some(block.clone()));
    assert_eq!(store.block_by_hash(hash(1, 9)).await.unwrap(), None);
    assert_eq!(store.block_by_number(3).await.unwrap(), None);

    let transactions = store.block_transactions(&block).await.unwrap();
    assert_eq!(transactions, bundle(1, 1).transactions);

    let tx = store.transaction(tx_hash(1, 1, 0)).await.unwrap().unwrap();
    assert_eq!(tx.block_number, 1);
    assert_eq!(tx.block_hash, hash(1, 1));

    let receipt = store.receipt(tx_hash(1, 1, 0)).await.unwrap().unwrap();
    assert!(receipt.status);
    assert_eq!(receipt.logs.len(), 1);
    assert_eq!(receipt, bundle(1, 1).receipts[0]);

    let native = Felt::from_bytes_be(&tx_hash(1, 1, 0).0);
    assert_eq!(store.transaction_by_native_hash(native).await.unwrap(), Some(tx));
    assert_eq!(store.transaction_by_native_hash(Felt::from(12345u64)).await.unwrap(), None);
}

pub(crate) async fn replay_is_noop<S: StoreWrite>(store: &S) {
    commit_chain(store, 0..=2, 1).await;

    assert_eq!(store.commit_block(&bundle(1, 1)).await.unwrap(), CommitOutcome::AlreadyCanonical);
    assert_eq!(store.commit_block(&bundle(2, 1)).await.unwrap(), CommitOutcome::AlreadyCanonical);

    assert_eq!(store.head().await.unwrap(), Some(ChainHead { number: 2, hash: hash(2, 1) }));
    assert_eq!(store.block_by_number(1).await.unwrap(), Some(bundle(1, 1).block));
    assert_eq!(store.block_by_number(2).await.unwrap(), Some(bundle(2, 1).block));
}

/// Moves the head without touching the canonical pointers, as a writer stopped between the two would.
#[async_trait]
pub(crate) trait ForceHead {
    async fn force_head(&self, head: ChainHead);
}

pub(crate) async fn resumes_interrupted_commit<S: StoreWrite + ForceHead>(store: &S) {
    commit_chain(store, 0..=2, 1).await;
    store.force_head(ChainHead { number: 1, hash: hash(1, 1) }).await;

    // block 2 is already behind its pointer, replaying it moves the head
    assert_eq!(store.commit_block(&bundle(2, 1)).await.unwrap(), CommitOutcome::Committed);
    assert_eq!(store.head().await.unwrap(), Some(ChainHead { number: 2, hash: hash(2, 1) }));
    assert_eq!(store.block_by_number(2).await.unwrap(), Some(bundle(2, 1).block));
    assert!(store.receipt(tx_hash(2, 1, 0)).await.unwrap().is_some());

    commit_chain(store, 3..=3, 1).await;
    assert_eq!(store.head().await.unwrap(), Some(ChainHead { number: 3, hash: hash(3, 1) }));
}

pub(crate) async fn rejects_broken_linkage<S: StoreWrite>(store: &S) {
    commit_chain(store, 0..=1, 1).await;

    assert_matches!(
        store.commit_block(&bundle(3, 1)).await,
        Err(StoreError::NotContiguous { number: 3, head: 1 })
    );
    assert_matches!(
        store.commit_block(&fork_bundle(2, 2, 2, 1)).await,
        Err(StoreError::ParentMismatch { number: 2, .. })
    );
    assert_eq!(store.head().await.unwrap(), Some(ChainHead { number: 1, hash: hash(1, 1) }));
    assert_eq!(store.block_by_number(2).await.unwrap(), None);
}

pub(crate) async fn rewind_and_recommit<S: StoreWrite>(store: &S) {
    commit_chain(store, 0..=3, 1).await;

    store.rewind(Some(1)).await.unwrap();
    assert_eq!(store.head().await.unwrap(), Some(ChainHead { number: 1, hash: hash(1, 1) }));
    assert_eq!(store.block_by_number(2).await.unwrap(), None);
    assert_eq!(store.block_by_hash(hash(2, 1)).await.unwrap(), None);
    assert_eq!(store.transaction(tx_hash(2, 1, 0)).await.unwrap(), None);

    store.commit_block(&fork_bundle(2, 2, 1, 1)).await.unwrap();
    store.commit_block(&fork_bundle(3, 2, 2, 1)).await.unwrap();
    store.commit_block(&fork_bundle(4, 2, 2, 1)).await.unwrap();

    // below the fork point nothing changed
    assert_eq!(store.block_by_number(1).await.unwrap(), Some(bundle(1, 1).block));
    assert_eq!(store.receipt(tx_hash(1, 1, 0)).await.unwrap(), Some(bundle(1, 1).receipts[0].clone()));

    // above it only the new fork is visible
    assert_eq!(store.canonical_hash(2).await.unwrap(), Some(hash(2, 2)));
    assert_eq!(store.receipt(tx_hash(2, 1, 0)).await.unwrap(), None);
    assert_eq!(store.receipt(tx_hash(3, 1, 0)).await.unwrap(), None);
    assert!(store.receipt(tx_hash(2, 2, 0)).await.unwrap().is_some());
    assert_eq!(store.head().await.unwrap(), Some(ChainHead { number: 4, hash: hash(4, 2) }));

    let logs = store.logs(&LogFilter { from_block: 0, to_block: 10, ..Default::default() }).await.unwrap();
    let blocks: Vec<_> = logs.iter().map(|log| log.block_hash).collect();
    assert_eq!(blocks, vec![hash(0, 1), hash(1, 1), hash(2, 2), hash(3, 2), hash(4, 2)]);
}

pub(crate) async fn replace_below_head<S: StoreWrite>(store: &S) {
    commit_chain(store, 0..=3, 1).await;

    assert_eq!(store.commit_block(&fork_bundle(2, 2, 1, 1)).await.unwrap(), CommitOutcome::Committed);
    assert_eq!(store.head().await.unwrap(), Some(ChainHead { number: 2, hash: hash(2, 2) }));
    assert_eq!(store.canonical_hash(3).await.unwrap(), None);
    assert_eq!(store.block_by_number(3).await.unwrap(), None);
    assert_eq!(store.block_by_hash(hash(2, 1)).await.unwrap(), None);
}

pub(crate) async fn logs_filter_and_order<S: StoreWrite>(store: &S) {
    store.commit_block(&fork_bundle(0, 1, 1, 2)).await.unwrap();
    store.commit_block(&fork_bundle(1, 1, 1, 3)).await.unwrap();
    store.commit_block(&fork_bundle(2, 1, 1, 0)).await.unwrap();

    let all = LogFilter { from_block: 0, to_block: 2, ..Default::default() };
    let logs = store.logs(&all).await.unwrap();
    let positions: Vec<_> = logs.iter().map(|log| (log.block_number, log.log_index)).collect();
    assert_eq!(positions, vec![(0, 0), (0, 1), (1, 0), (1, 1), (1, 2)]);

    let first_topic = LogFilter { topics: vec![vec![B256::with_last_byte(1)]], ..all.clone() };
    let positions: Vec<_> =
        store.logs(&first_topic).await.unwrap().iter().map(|log| (log.block_number, log.log_index)).collect();
    assert_eq!(positions, vec![(0, 1), (1, 1)]);

    let second_topic = LogFilter { topics: vec![vec![], vec![hash(1, 1)]], ..all.clone() };
    assert_eq!(store.logs(&second_topic).await.unwrap().len(), 3);

    let either = LogFilter { topics: vec![vec![B256::with_last_byte(0), B256::with_last_byte(2)]], ..all.clone() };
    assert_eq!(store.logs(&either).await.unwrap().len(), 3);

    let too_many_positions = LogFilter { topics: vec![vec![], vec![], vec![]], ..all.clone() };
    assert!(store.logs(&too_many_positions).await.unwrap().is_empty());

    let address = LogFilter { addresses: vec![Address::with_last_byte(2)], ..all.clone() };
    assert_eq!(store.logs(&address).await.unwrap().len(), 5);
    let other_address = LogFilter { addresses: vec![Address::with_last_byte(3)], ..all.clone() };
    assert!(store.logs(&other_address).await.unwrap().is_empty());

    let single = LogFilter { from_block: 1, to_block: 1, ..Default::default() };
    assert_eq!(store.logs(&single).await.unwrap().len(), 3);
}

pub(crate) async fn rewind_to_empty<S: StoreWrite>(store: &S) {
    commit_chain(store, 0..=1, 1).await;

    store.rewind(None).await.unwrap();
    assert_eq!(store.head().await.unwrap(), None);
    assert_eq!(store.block_by_number(0).await.unwrap(), None);

    // indexing may restart at any height
    store.commit_block(&bundle(5, 1)).await.unwrap();
    assert_eq!(store.head().await.unwrap(), Some(ChainHead { number: 5, hash: hash(5, 1) }));
}
