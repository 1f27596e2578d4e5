//! MongoDB backend.
//!
//! Writes follow the pointer protocol described at the crate root. Each payload document is upserted by id, so a
//! commit interrupted half-way can simply be retried. The pointer and the head are separate writes: a commit
//! interrupted between them leaves the head one block behind, which the retry repairs.

mod documents;

use crate::{check_commit, CommitOutcome, StoreRead, StoreResult, StoreWrite};
use async_trait::async_trait;
use documents::*;
use ep_block::{Block, BlockBundle, ChainHead, Felt, Log, LogFilter, Receipt, Transaction, B256};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{FindOptions, IndexOptions, ReplaceOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoStoreConfig {
    pub uri: String,
    pub database: String,
}

pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Connects to the database and creates the indexes if they are missing.
    pub async fn connect(config: &MongoStoreConfig) -> StoreResult<Self> {
        let client = Client::with_uri_str(&config.uri).await?;
        let database = client.database(&config.database);
        let store = Self { client, database };
        store.ensure_indexes().await?;
        tracing::debug!("Connected to MongoDB database {}", config.database);
        Ok(store)
    }

    /// Mongodb client uses Arc internally, reducing the cost of clone.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    fn collection<T>(&self, name: &str) -> Collection<T> {
        self.database.collection(name)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = IndexOptions::builder().unique(true).build();
        let index = |keys: Document| IndexModel::builder().keys(keys).build();

        self.collection::<Document>(CANONICAL_COLLECTION)
            .create_index(IndexModel::builder().keys(doc! { "number": 1 }).options(unique).build(), None)
            .await?;
        self.collection::<Document>(BLOCKS_COLLECTION).create_index(index(doc! { "number": 1 }), None).await?;
        self.collection::<Document>(TRANSACTIONS_COLLECTION)
            .create_indexes([index(doc! { "hash": 1 }), index(doc! { "native_hash": 1 }), index(doc! { "block_hash": 1 })], None)
            .await?;
        self.collection::<Document>(RECEIPTS_COLLECTION)
            .create_index(index(doc! { "transaction_hash": 1 }), None)
            .await?;
        self.collection::<Document>(LOGS_COLLECTION)
            .create_indexes(
                [
                    index(doc! { "block_hash": 1, "log_index": 1 }),
                    index(doc! { "block_number": 1 }),
                    index(doc! { "address": 1 }),
                ],
                None,
            )
            .await?;
        Ok(())
    }

    async fn find_one<T>(&self, collection: &str, filter: Document) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        Ok(self.collection::<T>(collection).find_one(filter, None).await?)
    }

    async fn find_many<T>(&self, collection: &str, filter: Document, options: Option<FindOptions>) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let cursor = self.collection::<T>(collection).find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Inserts or replaces the document with id `id`.
    async fn upsert<T>(&self, collection: &str, id: impl Into<Bson>, document: &T) -> StoreResult<()>
    where
        T: Serialize + Send + Sync,
    {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection::<T>(collection).replace_one(doc! { "_id": id.into() }, document, options).await?;
        Ok(())
    }

    async fn is_canonical(&self, number: i64, block_hash: &str) -> StoreResult<bool> {
        let pointer: Option<CanonicalDocument> = self.find_one(CANONICAL_COLLECTION, doc! { "_id": number }).await?;
        Ok(pointer.is_some_and(|pointer| pointer.hash == block_hash))
    }

    /// Marks every payload document of these blocks as superseded.
    async fn tombstone(&self, block_hashes: Vec<String>) -> StoreResult<()> {
        if block_hashes.is_empty() {
            return Ok(());
        }
        let update = doc! { "$set": { "tombstoned": true } };
        self.collection::<Document>(BLOCKS_COLLECTION)
            .update_many(doc! { "_id": { "$in": block_hashes.clone() } }, update.clone(), None)
            .await?;
        for collection in &PAYLOAD_COLLECTIONS[1..] {
            self.collection::<Document>(collection)
                .update_many(doc! { "block_hash": { "$in": block_hashes.clone() } }, update.clone(), None)
                .await?;
        }
        Ok(())
    }

    /// Drops the canonical pointers above `number` and tombstones the blocks they pointed to.
    async fn retract_above(&self, number: Option<u64>) -> StoreResult<()> {
        let filter = match number {
            Some(number) => doc! { "_id": { "$gt": to_i64(number)? } },
            None => doc! {},
        };
        let pointers: Vec<CanonicalDocument> = self.find_many(CANONICAL_COLLECTION, filter.clone(), None).await?;
        if pointers.is_empty() {
            return Ok(());
        }
        tracing::debug!("Retracting {} canonical blocks above {number:?}", pointers.len());

        self.collection::<Document>(CANONICAL_COLLECTION).delete_many(filter, None).await?;
        self.tombstone(pointers.into_iter().map(|pointer| pointer.hash).collect()).await
    }

    /// First document of `candidates` which belongs to a canonical block.
    async fn first_canonical<T>(&self, candidates: Vec<T>, key: impl Fn(&T) -> (i64, &str)) -> StoreResult<Option<T>> {
        for candidate in candidates {
            let (number, block_hash) = key(&candidate);
            if self.is_canonical(number, block_hash).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl StoreRead for MongoStore {
    async fn head(&self) -> StoreResult<Option<ChainHead>> {
        let head: Option<HeadDocument> = self.find_one(META_COLLECTION, doc! { "_id": HEAD_ID }).await?;
        head.map(|head| head.head()).transpose()
    }

    async fn canonical_hash(&self, number: u64) -> StoreResult<Option<B256>> {
        let pointer: Option<CanonicalDocument> =
            self.find_one(CANONICAL_COLLECTION, doc! { "_id": to_i64(number)? }).await?;
        pointer.map(|pointer| parse_hash(&pointer.hash)).transpose()
    }

    async fn block_by_number(&self, number: u64) -> StoreResult<Option<Block>> {
        let Some(hash) = self.canonical_hash(number).await? else { return Ok(None) };
        let block: Option<BlockDocument> = self.find_one(BLOCKS_COLLECTION, doc! { "_id": hex_key(&hash) }).await?;
        Ok(block.map(|doc| doc.block))
    }

    async fn block_by_hash(&self, hash: B256) -> StoreResult<Option<Block>> {
        let key = hex_key(&hash);
        let Some(doc) = self.find_one::<BlockDocument>(BLOCKS_COLLECTION, doc! { "_id": &key }).await? else {
            return Ok(None);
        };
        Ok(self.is_canonical(doc.number, &key).await?.then_some(doc.block))
    }

    async fn block_transactions(&self, block: &Block) -> StoreResult<Vec<Transaction>> {
        let key = hex_key(&block.hash());
        if !self.is_canonical(to_i64(block.number())?, &key).await? {
            return Ok(Vec::new());
        }
        let options = FindOptions::builder().sort(doc! { "transaction_index": 1 }).build();
        let docs: Vec<TransactionDocument> =
            self.find_many(TRANSACTIONS_COLLECTION, doc! { "block_hash": key }, Some(options)).await?;
        Ok(docs.into_iter().map(|doc| doc.transaction).collect())
    }

    async fn transaction(&self, hash: B256) -> StoreResult<Option<Transaction>> {
        let docs: Vec<TransactionDocument> =
            self.find_many(TRANSACTIONS_COLLECTION, doc! { "hash": hex_key(&hash) }, None).await?;
        let doc = self.first_canonical(docs, |doc| (doc.block_number, doc.block_hash.as_str())).await?;
        Ok(doc.map(|doc| doc.transaction))
    }

    async fn transaction_by_native_hash(&self, native_hash: Felt) -> StoreResult<Option<Transaction>> {
        let docs: Vec<TransactionDocument> = self
            .find_many(TRANSACTIONS_COLLECTION, doc! { "native_hash": native_hash.to_hex_string() }, None)
            .await?;
        let doc = self.first_canonical(docs, |doc| (doc.block_number, doc.block_hash.as_str())).await?;
        Ok(doc.map(|doc| doc.transaction))
    }

    async fn receipt(&self, transaction_hash: B256) -> StoreResult<Option<Receipt>> {
        let docs: Vec<ReceiptDocument> = self
            .find_many(RECEIPTS_COLLECTION, doc! { "transaction_hash": hex_key(&transaction_hash) }, None)
            .await?;
        let doc = self.first_canonical(docs, |doc| (doc.block_number, doc.block_hash.as_str())).await?;
        Ok(doc.map(|doc| doc.receipt))
    }

    async fn logs(&self, filter: &LogFilter) -> StoreResult<Vec<Log>> {
        if filter.from_block > filter.to_block {
            return Ok(Vec::new());
        }
        let range = doc! { "_id": { "$gte": to_i64(filter.from_block)?, "$lte": to_i64(filter.to_block)? } };
        let pointers: Vec<CanonicalDocument> = self.find_many(CANONICAL_COLLECTION, range, None).await?;
        if pointers.is_empty() {
            return Ok(Vec::new());
        }

        let hashes: Vec<String> = pointers.into_iter().map(|pointer| pointer.hash).collect();
        let mut query = doc! { "block_hash": { "$in": hashes } };
        if !filter.addresses.is_empty() {
            let addresses: Vec<String> = filter.addresses.iter().map(hex_key).collect();
            query.insert("address", doc! { "$in": addresses });
        }
        for (position, candidates) in filter.topics.iter().enumerate() {
            let mut condition = Document::new();
            if !candidates.is_empty() {
                condition.insert("$in", candidates.iter().map(hex_key).collect::<Vec<_>>());
            }
            if position + 1 == filter.topics.len() {
                // the log must have at least as many topics as the filter has positions
                condition.insert("$exists", true);
            }
            if !condition.is_empty() {
                query.insert(format!("topics.{position}"), condition);
            }
        }

        let options = FindOptions::builder().sort(doc! { "block_number": 1, "log_index": 1 }).build();
        let docs: Vec<LogDocument> = self.find_many(LOGS_COLLECTION, query, Some(options)).await?;
        Ok(docs.into_iter().map(|doc| doc.log).filter(|log| filter.matches(log)).collect())
    }
}

#[async_trait]
impl StoreWrite for MongoStore {
    async fn commit_block(&self, bundle: &BlockBundle) -> StoreResult<CommitOutcome> {
        let number = bundle.number();
        let hash = bundle.hash();

        let head = self.head().await?;
        let current = self.canonical_hash(number).await?;
        let parent = match number.checked_sub(1) {
            Some(parent) => self.canonical_hash(parent).await?,
            None => None,
        };
        if let Some(outcome) = check_commit(bundle, head, current, parent)? {
            return Ok(outcome);
        }

        // 1. payloads, invisible until the pointer flips
        let block = BlockDocument::new(&bundle.block)?;
        self.upsert(BLOCKS_COLLECTION, block.id.clone(), &block).await?;
        for tx in &bundle.transactions {
            let doc = TransactionDocument::new(tx)?;
            self.upsert(TRANSACTIONS_COLLECTION, doc.id.clone(), &doc).await?;
        }
        for receipt in &bundle.receipts {
            let doc = ReceiptDocument::new(receipt)?;
            self.upsert(RECEIPTS_COLLECTION, doc.id.clone(), &doc).await?;
        }
        for log in bundle.logs() {
            let doc = LogDocument::new(log)?;
            self.upsert(LOGS_COLLECTION, doc.id.clone(), &doc).await?;
        }

        // 2. canonical pointer
        let pointer = CanonicalDocument::new(number, hash)?;
        self.upsert(CANONICAL_COLLECTION, pointer.id, &pointer).await?;

        // 3. head
        self.upsert(META_COLLECTION, HEAD_ID, &HeadDocument::new(ChainHead { number, hash })?).await?;

        // 4. superseded blocks
        if let Some(previous) = current.filter(|previous| *previous != hash) {
            self.tombstone(vec![hex_key(&previous)]).await?;
        }
        self.retract_above(Some(number)).await?;

        Ok(CommitOutcome::Committed)
    }

    async fn rewind(&self, to: Option<u64>) -> StoreResult<()> {
        let head = match to {
            Some(to) => self.canonical_hash(to).await?.map(|hash| ChainHead { number: to, hash }),
            None => None,
        };
        match head {
            Some(head) => self.upsert(META_COLLECTION, HEAD_ID, &HeadDocument::new(head)?).await?,
            None => {
                self.collection::<Document>(META_COLLECTION).delete_one(doc! { "_id": HEAD_ID }, None).await?;
            }
        }
        self.retract_above(to).await
    }
}

#[cfg(test)]
mod tests {
    //! These tests need a running MongoDB, set `ETHANE_TEST_MONGODB_URI` and run with `--ignored`.
    use super::*;
    use crate::tests as conformance;
    use std::time::{SystemTime, UNIX_EPOCH};

    async fn store() -> MongoStore {
        let uri = std::env::var("ETHANE_TEST_MONGODB_URI").expect("ETHANE_TEST_MONGODB_URI must be set");
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let database = format!("ethane_test_{nanos}");
        MongoStore::connect(&MongoStoreConfig { uri, database }).await.unwrap()
    }

    macro_rules! mongo_conformance {
        ($($name:ident),* $(,)?) => {
            $(
                #[tokio::test]
                #[ignore = "needs ETHANE_TEST_MONGODB_URI"]
                async fn $name() {
                    let store = store().await;
                    conformance::$name(&store).await;
                    store.database.drop(None).await.unwrap();
                }
            )*
        };
    }

    #[async_trait]
    impl conformance::ForceHead for MongoStore {
        async fn force_head(&self, head: ChainHead) {
            self.upsert(META_COLLECTION, HEAD_ID, &HeadDocument::new(head).unwrap()).await.unwrap();
        }
    }

    #[tokio::test]
    #[ignore = "needs ETHANE_TEST_MONGODB_URI"]
    async fn resumes_interrupted_commit() {
        let store = store().await;
        conformance::resumes_interrupted_commit(&store).await;
        store.database.drop(None).await.unwrap();
    }

    mongo_conformance!(
        commit_and_read,
        replay_is_noop,
        rejects_broken_linkage,
        rewind_and_recommit,
        replace_below_head,
        logs_filter_and_order,
        rewind_to_empty,
    );

    #[tokio::test]
    #[ignore = "needs ETHANE_TEST_MONGODB_URI"]
    async fn superseded_documents_are_tombstoned() {
        let store = store().await;
        for n in 0..3 {
            store.commit_block(&ep_block::testing::bundle(n, 1)).await.unwrap();
        }
        store.rewind(Some(0)).await.unwrap();

        let tombstoned: Vec<BlockDocument> =
            store.find_many(BLOCKS_COLLECTION, doc! { "tombstoned": true }, None).await.unwrap();
        assert_eq!(tombstoned.len(), 2);
        let logs: Vec<LogDocument> = store.find_many(LOGS_COLLECTION, doc! { "tombstoned": false }, None).await.unwrap();
        assert_eq!(logs.len(), 1);
        store.database.drop(None).await.unwrap();
    }
}
