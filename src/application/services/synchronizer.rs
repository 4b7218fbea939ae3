use super::offline_storage::OfflineStorage;
use crate::application::ports::StudentBackend;
use crate::domain::entities::{
    OperationPayload, PendingOperation, SyncOutcome, SyncStatus, SyncSummary,
};
use crate::domain::value_objects::OperationKind;
use crate::shared::error::AppError;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Replays pending operations against the backend, one pass at a time.
pub struct Synchronizer {
    storage: OfflineStorage,
    backend: Arc<dyn StudentBackend>,
    max_attempts: u32,
    in_flight: Mutex<()>,
    status: RwLock<SyncStatus>,
}

impl Synchronizer {
    pub fn new(storage: OfflineStorage, backend: Arc<dyn StudentBackend>, max_attempts: u32) -> Self {
        Self {
            storage,
            backend,
            max_attempts: max_attempts.max(1),
            in_flight: Mutex::new(()),
            status: RwLock::new(SyncStatus::default()),
        }
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Runs a pass unless one is already in flight, in which case this
    /// returns `AlreadyRunning` without touching the queue.
    pub async fn sync(&self) -> Result<SyncOutcome, AppError> {
        let Ok(_pass) = self.in_flight.try_lock() else {
            debug!("Sync already in progress, ignoring trigger");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        self.status.write().await.is_syncing = true;
        let result = self.run_pass().await;

        let mut status = self.status.write().await;
        status.is_syncing = false;
        match &result {
            Ok(summary) => {
                status.last_sync = Some(Utc::now());
                status.last_summary = Some(*summary);
                status.sync_errors += summary.failed as u64;
                info!(
                    synced = summary.synced,
                    failed = summary.failed,
                    deferred = summary.deferred,
                    parked = summary.parked,
                    remaining = summary.remaining,
                    "Sync pass finished"
                );
            }
            Err(e) => error!(error = %e, "Sync pass aborted"),
        }

        result.map(SyncOutcome::Completed)
    }

    async fn run_pass(&self) -> Result<SyncSummary, AppError> {
        let mut summary = SyncSummary::default();
        let order = self.storage.queue().read_operations().await?.replay_order();

        for (kind, id) in order {
            // Re-read so retargeted payloads are used and cleared entries skipped.
            let operations = self.storage.queue().read_operations().await?;
            let Some(operation) = operations.get(kind, id).cloned() else {
                continue;
            };
            if operation.parked {
                continue;
            }
            if kind != OperationKind::Create {
                if let Some(local_id) = operation.unresolved_local_id() {
                    if operations.has_pending_create_for(local_id) {
                        debug!(id = %id, kind = %kind, "Deferring until its record is created");
                        summary.deferred += 1;
                        continue;
                    }
                }
            }

            match self.replay(&operation).await {
                Ok(created) => {
                    self.storage.complete_operation(kind, id, created).await?;
                    summary.synced += 1;
                }
                Err(e) => {
                    warn!(id = %id, kind = %kind, error = %e, "Failed to replay pending operation");
                    summary.failed += 1;
                    let parked = self
                        .storage
                        .record_failure(kind, id, e.to_string(), self.max_attempts)
                        .await?;
                    if parked == Some(true) {
                        warn!(id = %id, kind = %kind, "Pending operation parked after repeated failures");
                        summary.parked += 1;
                    }
                }
            }
        }

        summary.remaining = self.storage.queue().read_operations().await?.len();
        Ok(summary)
    }

    /// Issues the backend call. For a Create, returns `(local_id, server_id)`.
    async fn replay(
        &self,
        operation: &PendingOperation,
    ) -> Result<Option<(String, String)>, AppError> {
        match (operation.kind, &operation.payload) {
            (OperationKind::Create, OperationPayload::Record(student)) => {
                let created = self.backend.create_student(student).await?;
                let server_id = created.server_id.ok_or_else(|| {
                    AppError::Backend("Created record came back without an id".to_string())
                })?;
                Ok(student.local_id.clone().map(|local_id| (local_id, server_id)))
            }
            (OperationKind::Update, OperationPayload::Record(student)) => {
                let id = student.authoritative_id().ok_or_else(|| {
                    AppError::InvalidInput("Update payload has no id".to_string())
                })?;
                self.backend.update_student(id, student).await?;
                Ok(None)
            }
            (OperationKind::Delete, OperationPayload::Target { id }) => {
                self.backend.delete_student(id).await?;
                Ok(None)
            }
            (kind, _) => Err(AppError::InvalidInput(format!(
                "{kind} operation has a mismatched payload"
            ))),
        }
    }
}
