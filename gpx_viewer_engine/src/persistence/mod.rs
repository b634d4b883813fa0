use async_trait::async_trait;

pub mod constants;
mod adapter;
mod memory;
mod sqlite;

pub use adapter::*;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(String),
    #[error("failed to serialize {key}: {message}")]
    Serialize { key: String, message: String },
    #[error("failed to deserialize {key}: {message}")]
    Deserialize { key: String, message: String },
}

/// Durable string key/value store. Writes to different keys are independent,
/// there is no transaction spanning several keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    async fn clear(&self) -> Result<(), PersistenceError>;
}
