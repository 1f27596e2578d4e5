//! The indexing loop.
//!
//! Native blocks are processed strictly in increasing order. Each one is fetched, checked against the canonical
//! head, decoded, and committed. A block whose parent is not the canonical block below it means the native chain
//! reorganized: the pipeline walks back to the last block both chains agree on, rewinds the store to it, and
//! resumes from there. A shorter native chain is detected while idle and goes through the same walk.
//!
//! Source and store failures are retried forever with backoff, resuming from the last committed block. A block
//! which fails to decode halts the pipeline until it is restarted.

use crate::decode::{BlockDecoder, DecodeError};
use crate::BlockSource;
use ec_db::{CommitOutcome, StoreError, StoreWrite};
use ec_native_client::NativeClientError;
use ep_block::execution::native_hash_to_b256;
use ep_utils::retry::{RetryConfig, RetryState};
use ep_utils::service::ServiceContext;
use ep_utils::trim_hash;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("Native chain error: {0}")]
    Source(#[from] NativeClientError),
    #[error("Canonical store error: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to decode block #{number}: {source}")]
    Decode { number: u64, source: DecodeError },
    #[error("Reorg below block #{number} is deeper than {max_depth} blocks")]
    ReorgTooDeep { number: u64, max_depth: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// First block indexed into an empty store.
    pub start_block: u64,
    #[serde(serialize_with = "ep_utils::serde::serialize_duration", deserialize_with = "ep_utils::serde::deserialize_duration")]
    pub poll_interval: Duration,
    /// Number of canonical blocks a reorg may replace before indexing stops.
    pub max_reorg_depth: u64,
    /// Backoff on source and store failures. Attempts past `max_attempts` keep waiting `max_delay`.
    pub retry: RetryConfig,
    #[serde(serialize_with = "ep_utils::serde::serialize_duration", deserialize_with = "ep_utils::serde::deserialize_duration")]
    pub status_interval: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            poll_interval: Duration::from_secs(2),
            max_reorg_depth: 64,
            retry: RetryConfig {
                max_attempts: u32::MAX,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
                log_interval: Duration::from_secs(10),
            },
            status_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerEvent {
    Starting { from: u64 },
    Committed { number: u64 },
    /// The canonical chain was rewound from `from` to the common ancestor `to`, [`None`] when nothing was left.
    Reorg { from: u64, to: Option<u64> },
    /// Caught up with the tip of the native chain.
    Idle,
    Halted { number: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaltReport {
    pub number: u64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexerStatus {
    /// Last committed block.
    pub head: Option<u64>,
    pub halted_at: Option<HaltReport>,
}

#[derive(Debug)]
enum Step {
    Committed(u64),
    /// The store was rewound to this common ancestor.
    Rewound(Option<u64>),
    Idle,
}

struct Throughput {
    since: Instant,
    blocks: u64,
}

impl Throughput {
    fn new() -> Self {
        Self { since: Instant::now(), blocks: 0 }
    }

    fn record(&mut self, number: u64, interval: Duration) {
        self.blocks += 1;
        let elapsed = self.since.elapsed();
        if elapsed >= interval {
            let rate = self.blocks as f64 / elapsed.as_secs_f64();
            tracing::info!("📦 Indexed up to #{number} ({rate:.2} blocks/s)");
            *self = Self::new();
        }
    }
}

pub struct Indexer {
    config: IndexerConfig,
    decoder: BlockDecoder,
    source: Arc<dyn BlockSource>,
    store: Arc<dyn StoreWrite>,
    events: Option<mpsc::UnboundedSender<IndexerEvent>>,
    status: watch::Sender<IndexerStatus>,
}

impl Indexer {
    pub fn new(
        config: IndexerConfig,
        decoder: BlockDecoder,
        source: Arc<dyn BlockSource>,
        store: Arc<dyn StoreWrite>,
    ) -> Self {
        let (status, _) = watch::channel(IndexerStatus::default());
        Self { config, decoder, source, store, events: None, status }
    }

    /// Publishes [`IndexerEvent`]s to `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<IndexerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn status(&self) -> watch::Receiver<IndexerStatus> {
        self.status.subscribe()
    }

    fn emit(&self, event: IndexerEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Runs until cancelled. Only returns an error when the store cannot be reconciled with the native chain.
    pub async fn run(self, ctx: ServiceContext) -> Result<(), IndexerError> {
        let Some(mut next) = self.resume_height(&ctx).await else {
            return Ok(());
        };
        tracing::info!("⛓️  Indexing from block #{next}");
        self.emit(IndexerEvent::Starting { from: next });

        let mut backoff: Option<RetryState> = None;
        let mut caught_up = false;
        let mut throughput = Throughput::new();

        while !ctx.is_cancelled() {
            match self.step(next).await {
                Ok(Step::Committed(number)) => {
                    backoff = None;
                    caught_up = false;
                    next = number + 1;
                    self.status.send_modify(|status| status.head = Some(number));
                    self.emit(IndexerEvent::Committed { number });
                    throughput.record(number, self.config.status_interval);
                }
                Ok(Step::Rewound(ancestor)) => {
                    backoff = None;
                    caught_up = false;
                    next = ancestor.map_or(self.config.start_block, |number| number + 1);
                    self.status.send_modify(|status| status.head = ancestor);
                }
                Ok(Step::Idle) => {
                    backoff = None;
                    if !caught_up {
                        caught_up = true;
                        tracing::info!("🥳 The indexer has caught up with the tip of the chain");
                        self.emit(IndexerEvent::Idle);
                    }
                    ctx.run_until_cancelled(tokio::time::sleep(self.config.poll_interval)).await;
                }
                Err(IndexerError::Decode { number, source }) => {
                    tracing::error!("❗ Indexing halted at block #{number}: {source}");
                    let report = HaltReport { number, error: source.to_string() };
                    self.status.send_modify(|status| status.halted_at = Some(report));
                    self.emit(IndexerEvent::Halted { number });
                    ctx.cancelled().await;
                    return Ok(());
                }
                Err(err @ IndexerError::ReorgTooDeep { .. }) => return Err(err),
                Err(err) => {
                    let retry = backoff.get_or_insert_with(|| RetryState::new(self.config.retry.clone()));
                    let delay = retry.next_attempt().unwrap_or(self.config.retry.max_delay);
                    if retry.should_log() {
                        tracing::warn!(
                            "Indexing block #{next} failed (attempt {}, retrying in {delay:?}): {err}",
                            retry.attempts()
                        );
                    }
                    ctx.run_until_cancelled(tokio::time::sleep(delay)).await;
                }
            }
        }
        Ok(())
    }

    /// First block to index: above the canonical head, or the configured start on an empty store.
    async fn resume_height(&self, ctx: &ServiceContext) -> Option<u64> {
        let mut retry = RetryState::new(self.config.retry.clone());
        loop {
            match self.store.head().await {
                Ok(head) => {
                    self.status.send_modify(|status| status.head = head.map(|head| head.number));
                    return Some(head.map_or(self.config.start_block, |head| head.number + 1));
                }
                Err(err) => {
                    let delay = retry.next_attempt().unwrap_or(self.config.retry.max_delay);
                    if retry.should_log() {
                        tracing::warn!("Reading the canonical head failed, retrying in {delay:?}: {err}");
                    }
                    ctx.run_until_cancelled(tokio::time::sleep(delay)).await?;
                }
            }
        }
    }

    async fn step(&self, number: u64) -> Result<Step, IndexerError> {
        let Some(block) = self.source.block(number).await? else {
            return self.check_tip().await;
        };

        if let Some(parent) = number.checked_sub(1) {
            if let Some(canonical) = self.store.canonical_hash(parent).await? {
                if canonical != native_hash_to_b256(&block.header.parent_hash) {
                    tracing::warn!("⚠️ Reorg detected at block {number}");
                    return Ok(Step::Rewound(self.rewind(number).await?));
                }
            }
        }

        let bundle = self.decoder.decode_block(&block).map_err(|source| IndexerError::Decode { number, source })?;
        match self.store.commit_block(&bundle).await? {
            CommitOutcome::Committed => {
                tracing::info!("✨ Indexed #{} ({})", number, trim_hash(&bundle.hash()));
            }
            CommitOutcome::AlreadyCanonical => {
                tracing::debug!("Block #{number} is already canonical");
            }
        }
        Ok(Step::Committed(number))
    }

    /// Detects a native tip below, or different from, the canonical head.
    async fn check_tip(&self) -> Result<Step, IndexerError> {
        let Some(head) = self.store.head().await? else {
            return Ok(Step::Idle);
        };
        let latest = self.source.latest().await?;
        let retracted = latest.block_number < head.number
            || (latest.block_number == head.number && native_hash_to_b256(&latest.block_hash) != head.hash);
        if !retracted {
            return Ok(Step::Idle);
        }
        tracing::warn!("⚠️ Reorg detected at block {}", latest.block_number.min(head.number));
        Ok(Step::Rewound(self.rewind(head.number + 1).await?))
    }

    /// Walks back from `number - 1` to the highest block on which the store and the source agree, and rewinds
    /// the store to it.
    async fn rewind(&self, number: u64) -> Result<Option<u64>, IndexerError> {
        let head = self.store.head().await?.map_or(0, |head| head.number);
        let max_depth = self.config.max_reorg_depth;

        let mut height = number.checked_sub(1);
        let ancestor = loop {
            let Some(candidate) = height else {
                break None;
            };
            if head.saturating_sub(candidate) > max_depth {
                return Err(IndexerError::ReorgTooDeep { number, max_depth });
            }
            let Some(canonical) = self.store.canonical_hash(candidate).await? else {
                break None;
            };
            let native = self.source.block_hash(candidate).await?;
            if native.map(|hash| native_hash_to_b256(&hash)) == Some(canonical) {
                break Some(candidate);
            }
            height = candidate.checked_sub(1);
        };

        self.store.rewind(ancestor).await?;
        match ancestor {
            Some(ancestor) => tracing::info!("⏪ Rewound canonical chain from #{head} to #{ancestor}"),
            None => tracing::info!("⏪ Rewound canonical chain from #{head}, no common ancestor left"),
        }
        self.emit(IndexerEvent::Reorg { from: head, to: ancestor });
        Ok(ancestor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecoderConfig;
    use crate::testing::{replay_block, replay_hash, ReplaySource};
    use assert_matches::assert_matches;
    use ec_db::{MemoryStore, StoreRead};
    use ec_native_client::{ExecutionStatus, NativeBlock, NativeReceipt, NativeTransaction, TransactionWithReceipt};
    use ep_block::execution::encode_execute_calldata;
    use ep_convert::{AddressMapping, GasScale};
    use rstest::rstest;
    use starknet_types_core::felt::Felt;
    use tokio::task::JoinHandle;
    use tracing_test::traced_test;

    const EXECUTION_CONTRACT: Felt = Felt::from_hex_unchecked("0xec0");

    fn config(max_reorg_depth: u64) -> IndexerConfig {
        IndexerConfig {
            start_block: 0,
            poll_interval: Duration::from_millis(10),
            max_reorg_depth,
            retry: RetryConfig {
                max_attempts: u32::MAX,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                log_interval: Duration::from_secs(1),
            },
            status_interval: Duration::from_secs(5),
        }
    }

    fn decoder() -> BlockDecoder {
        BlockDecoder::new(DecoderConfig {
            mapping: AddressMapping::new(EXECUTION_CONTRACT, Felt::from_hex_unchecked("0xacc0")),
            gas_scale: GasScale::V1,
            block_gas_limit: 7_000_000,
        })
    }

    struct Harness {
        ctx: ServiceContext,
        events: mpsc::UnboundedReceiver<IndexerEvent>,
        status: watch::Receiver<IndexerStatus>,
        task: JoinHandle<Result<(), IndexerError>>,
    }

    impl Harness {
        fn start(config: IndexerConfig, source: Arc<ReplaySource>, store: Arc<MemoryStore>) -> Self {
            let (sender, events) = mpsc::unbounded_channel();
            let indexer = Indexer::new(config, decoder(), source, store).with_events(sender);
            let status = indexer.status();
            let ctx = ServiceContext::new();
            let task = tokio::spawn(indexer.run(ctx.clone()));
            Self { ctx, events, status, task }
        }

        /// Events up to and including `expected`.
        async fn wait_for(&mut self, expected: IndexerEvent) -> Vec<IndexerEvent> {
            let events = &mut self.events;
            tokio::time::timeout(Duration::from_secs(5), async move {
                let mut seen = vec![];
                while let Some(event) = events.recv().await {
                    seen.push(event);
                    if event == expected {
                        return seen;
                    }
                }
                panic!("Indexer stopped before {expected:?}, saw {seen:?}");
            })
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for {expected:?}"))
        }

        async fn stop(self) -> Result<(), IndexerError> {
            self.ctx.cancel_global();
            tokio::time::timeout(Duration::from_secs(5), self.task).await.unwrap().unwrap()
        }
    }

    async fn canonical(store: &MemoryStore, numbers: std::ops::RangeInclusive<u64>) -> Vec<Felt> {
        let mut hashes = vec![];
        for number in numbers {
            let hash = store.canonical_hash(number).await.unwrap().unwrap();
            hashes.push(Felt::from_bytes_be(&hash.0));
        }
        hashes
    }

    /// A block carrying an `eth_send_transaction` invoke whose signature is missing.
    fn undecodable_block(number: u64) -> NativeBlock {
        let mut block = replay_block(number, 0, 0);
        block.transactions.push(TransactionWithReceipt {
            transaction: NativeTransaction {
                tx_type: "INVOKE".to_string(),
                version: Some(Felt::ONE),
                sender_address: Some(Felt::from(0x5e4du64)),
                calldata: encode_execute_calldata(EXECUTION_CONTRACT, &[0x02, 0xc0]),
                signature: vec![],
                nonce: Some(Felt::ZERO),
            },
            receipt: NativeReceipt {
                transaction_hash: Felt::from(0xbadu64),
                execution_status: ExecutionStatus::Succeeded,
                revert_reason: None,
                events: vec![],
            },
        });
        block
    }

    #[tokio::test]
    async fn test_indexes_to_tip() {
        let source = Arc::new(ReplaySource::linear(4, 0));
        let store = Arc::new(MemoryStore::new());
        let mut harness = Harness::start(config(8), source.clone(), store.clone());

        let events = harness.wait_for(IndexerEvent::Idle).await;
        assert_eq!(events[0], IndexerEvent::Starting { from: 0 });
        assert_eq!(events.len(), 7);
        assert_eq!(store.head().await.unwrap().unwrap().number, 4);
        assert_eq!(harness.status.borrow().head, Some(4));

        source.reorg(5, 0, 6);
        harness.wait_for(IndexerEvent::Committed { number: 6 }).await;
        harness.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_resumes_above_head() {
        let source = Arc::new(ReplaySource::linear(4, 0));
        let store = Arc::new(MemoryStore::new());
        let mut harness = Harness::start(config(8), source.clone(), store.clone());
        harness.wait_for(IndexerEvent::Idle).await;
        harness.stop().await.unwrap();

        let mut harness = Harness::start(config(8), source, store);
        let events = harness.wait_for(IndexerEvent::Idle).await;
        assert_eq!(events, vec![IndexerEvent::Starting { from: 5 }, IndexerEvent::Idle]);
        harness.stop().await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn test_replay_is_idempotent() {
        let source = Arc::new(ReplaySource::linear(3, 0));
        let store = Arc::new(MemoryStore::new());
        let indexer = Indexer::new(config(8), decoder(), source, store.clone());
        for number in 0..=3 {
            assert_matches!(indexer.step(number).await, Ok(Step::Committed(n)) if n == number);
        }
        let before = store.block_by_number(2).await.unwrap();

        assert_matches!(indexer.step(2).await, Ok(Step::Committed(2)));
        assert_eq!(store.block_by_number(2).await.unwrap(), before);
        assert!(logs_contain("Block #2 is already canonical"));
        assert_eq!(store.head().await.unwrap().unwrap().number, 3);
    }

    #[tokio::test]
    async fn test_reorg_rewinds_to_common_ancestor() {
        let source = Arc::new(ReplaySource::linear(5, 0));
        let store = Arc::new(MemoryStore::new());
        let mut harness = Harness::start(config(8), source.clone(), store.clone());
        harness.wait_for(IndexerEvent::Idle).await;
        let superseded = store.canonical_hash(4).await.unwrap().unwrap();

        source.reorg(3, 1, 7);
        let events = harness.wait_for(IndexerEvent::Committed { number: 7 }).await;
        assert!(events.contains(&IndexerEvent::Reorg { from: 5, to: Some(2) }));

        assert_eq!(canonical(&store, 0..=2).await, (0..=2).map(|n| replay_hash(n, 0)).collect::<Vec<_>>());
        assert_eq!(canonical(&store, 3..=7).await, (3..=7).map(|n| replay_hash(n, 1)).collect::<Vec<_>>());
        assert_eq!(store.block_by_hash(superseded).await.unwrap(), None);
        assert!(store.is_tombstoned(superseded).await);
        harness.stop().await.unwrap();
    }

    #[rstest]
    #[case::same_prefix(None, Some(3))]
    #[case::new_fork(Some(1), Some(2))]
    #[tokio::test]
    async fn test_tail_retraction(#[case] fork: Option<u64>, #[case] ancestor: Option<u64>) {
        let source = Arc::new(ReplaySource::linear(5, 0));
        let store = Arc::new(MemoryStore::new());
        let mut harness = Harness::start(config(8), source.clone(), store.clone());
        harness.wait_for(IndexerEvent::Idle).await;

        match fork {
            Some(fork) => source.reorg(3, fork, 3),
            None => source.truncate(3),
        }
        harness.wait_for(IndexerEvent::Reorg { from: 5, to: ancestor }).await;
        harness.wait_for(IndexerEvent::Idle).await;

        let head = store.head().await.unwrap().unwrap();
        assert_eq!(head.number, 3);
        assert_eq!(Felt::from_bytes_be(&head.hash.0), replay_hash(3, fork.unwrap_or(0)));
        assert_eq!(store.block_by_number(4).await.unwrap(), None);
        harness.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_reorg_too_deep() {
        let source = Arc::new(ReplaySource::linear(5, 0));
        let store = Arc::new(MemoryStore::new());
        let mut harness = Harness::start(config(2), source.clone(), store.clone());
        harness.wait_for(IndexerEvent::Idle).await;

        source.reorg(1, 1, 6);
        let result = tokio::time::timeout(Duration::from_secs(5), harness.task).await.unwrap().unwrap();
        assert_matches!(result, Err(IndexerError::ReorgTooDeep { number: 6, max_depth: 2 }));
        assert_eq!(store.head().await.unwrap().unwrap().number, 5);
    }

    #[tokio::test]
    async fn test_decode_error_halts() {
        let source = Arc::new(ReplaySource::linear(2, 0));
        source.push(undecodable_block(3));
        let store = Arc::new(MemoryStore::new());

        for _ in 0..2 {
            let mut harness = Harness::start(config(8), source.clone(), store.clone());
            harness.wait_for(IndexerEvent::Halted { number: 3 }).await;
            let halted = harness.status.borrow().halted_at.clone().unwrap();
            assert_eq!(halted.number, 3);
            assert!(halted.error.contains("0xbad"), "{}", halted.error);

            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(!harness.task.is_finished());
            assert_eq!(store.head().await.unwrap().unwrap().number, 2);
            harness.stop().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_source_outage_is_retried() {
        let source = Arc::new(ReplaySource::linear(3, 0));
        source.fail_next((0..4).map(|i| NativeClientError::BackendUnavailable {
            method: "starknet_getBlockWithReceipts",
            attempts: 5,
            message: format!("connection refused ({i})"),
        }));
        let store = Arc::new(MemoryStore::new());
        let mut harness = Harness::start(config(8), source, store.clone());

        let events = harness.wait_for(IndexerEvent::Idle).await;
        assert_eq!(
            events.iter().filter(|event| matches!(event, IndexerEvent::Committed { .. })).count(),
            4
        );
        assert_eq!(store.head().await.unwrap().unwrap().number, 3);
        harness.stop().await.unwrap();
    }
}
