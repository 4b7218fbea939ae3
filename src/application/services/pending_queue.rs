use crate::application::ports::KeyValueStore;
use crate::domain::entities::{OperationPayload, PendingOperation, PendingOperations, PendingSnapshot};
use crate::domain::value_objects::{OperationId, OperationKind};
use crate::shared::error::AppError;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const PENDING_OPERATIONS_KEY: &str = "pendingOperations";

#[derive(Clone)]
pub struct PendingOperationQueue {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl PendingOperationQueue {
    pub fn new(kv: Arc<dyn KeyValueStore>, write_lock: Arc<Mutex<()>>) -> Self {
        Self { kv, write_lock }
    }

    pub async fn enqueue(
        &self,
        kind: OperationKind,
        payload: OperationPayload,
    ) -> Result<PendingOperation, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut operations = self.read_operations().await?;
        let operation = operations
            .push(kind, payload, Utc::now())
            .map_err(AppError::InvalidInput)?;
        self.write_operations(&operations).await?;
        debug!(id = %operation.id, kind = %kind, "Enqueued pending operation");
        Ok(operation)
    }

    /// Removes exactly that entry. Returns whether it was present; a second
    /// call for the same id writes nothing.
    pub async fn dequeue(&self, kind: OperationKind, id: OperationId) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut operations = self.read_operations().await?;
        if operations.remove(kind, id).is_none() {
            return Ok(false);
        }
        self.write_operations(&operations).await?;
        Ok(true)
    }

    pub async fn snapshot(&self) -> PendingSnapshot {
        self.load().await.snapshot()
    }

    pub async fn pending_count(&self) -> usize {
        self.load().await.len()
    }

    pub async fn find(&self, kind: OperationKind, id: OperationId) -> Option<PendingOperation> {
        self.load().await.get(kind, id).cloned()
    }

    /// Drops every entry; the id high-water mark is kept.
    pub async fn clear(&self) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut operations = self.read_operations().await?;
        operations.clear();
        self.write_operations(&operations).await
    }

    pub async fn release_parked(&self) -> Result<usize, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut operations = self.read_operations().await?;
        let released = operations.release_parked();
        if released > 0 {
            self.write_operations(&operations).await?;
        }
        Ok(released)
    }

    pub(crate) async fn load(&self) -> PendingOperations {
        match self.read_operations().await {
            Ok(operations) => operations,
            Err(e) => {
                warn!(error = %e, "Failed to read pending operations, treating queue as empty");
                PendingOperations::default()
            }
        }
    }

    pub(crate) async fn read_operations(&self) -> Result<PendingOperations, AppError> {
        let Some(raw) = self.kv.get(PENDING_OPERATIONS_KEY).await? else {
            return Ok(PendingOperations::default());
        };
        match serde_json::from_str::<PendingOperations>(&raw) {
            Ok(operations) => Ok(operations),
            Err(e) => {
                warn!(
                    error = %e,
                    key = PENDING_OPERATIONS_KEY,
                    "Stored pending operations are corrupt, treating queue as empty"
                );
                Ok(PendingOperations::default())
            }
        }
    }

    pub(crate) fn operations_entry(
        operations: &PendingOperations,
    ) -> Result<(String, String), AppError> {
        let value = serde_json::to_string(operations)
            .map_err(|e| AppError::SerializationError(e.to_string()))?;
        Ok((PENDING_OPERATIONS_KEY.to_string(), value))
    }

    pub(crate) async fn write_operations(
        &self,
        operations: &PendingOperations,
    ) -> Result<(), AppError> {
        let (key, value) = Self::operations_entry(operations)?;
        self.kv.put(&key, value).await
    }
}
