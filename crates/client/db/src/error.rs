use ep_block::B256;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] mongodb::bson::ser::Error),
    #[error("Failed to deserialize document: {0}")]
    Deserialize(#[from] mongodb::bson::de::Error),
    #[error("Block #{number} is not contiguous with the head #{head}")]
    NotContiguous { number: u64, head: u64 },
    #[error("Block #{number} has parent {parent} but the canonical block #{} is {canonical}", number.saturating_sub(1))]
    ParentMismatch { number: u64, parent: B256, canonical: B256 },
    #[error("Value {0} does not fit in a stored integer")]
    IntegerOverflow(u64),
    #[error("Store is corrupt: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
