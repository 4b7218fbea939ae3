use crate::shared::error::AppError;
use async_trait::async_trait;

/// Durable string-keyed storage shared by the roster and the pending queue.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn put(&self, key: &str, value: String) -> Result<(), AppError>;

    /// Writes every entry or none of them.
    async fn put_many(&self, entries: Vec<(String, String)>) -> Result<(), AppError>;

    async fn remove(&self, key: &str) -> Result<(), AppError>;
}
