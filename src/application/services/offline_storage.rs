use super::pending_queue::PendingOperationQueue;
use super::record_store::LocalRecordStore;
use crate::application::ports::KeyValueStore;
use crate::domain::entities::{
    OperationPayload, PendingOperation, PendingOperations, Roster, Student, StudentPatch,
};
use crate::domain::validation::validate_record;
use crate::domain::value_objects::{OperationId, OperationKind};
use crate::shared::error::AppError;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A roster mutation requested by the UI.
#[derive(Debug, Clone)]
pub enum RosterMutation {
    Insert(Student),
    Update { id: String, patch: StudentPatch },
    Delete { id: String },
}

#[derive(Debug, Clone)]
pub struct AppliedMutation {
    /// The inserted, merged or removed record.
    pub record: Student,
    /// The queued entry, `None` when the caller owes the backend call.
    pub operation: Option<PendingOperation>,
    pub roster: Vec<Student>,
}

/// Record store and pending queue over one key-value store. Every combined
/// change is computed in memory and written with a single `put_many`.
#[derive(Clone)]
pub struct OfflineStorage {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
    records: LocalRecordStore,
    queue: PendingOperationQueue,
}

impl OfflineStorage {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let write_lock = Arc::new(Mutex::new(()));
        Self {
            records: LocalRecordStore::new(kv.clone(), write_lock.clone()),
            queue: PendingOperationQueue::new(kv.clone(), write_lock.clone()),
            kv,
            write_lock,
        }
    }

    pub fn records(&self) -> &LocalRecordStore {
        &self.records
    }

    pub fn queue(&self) -> &PendingOperationQueue {
        &self.queue
    }

    /// Applies the local mutation and enqueues its pending operation as one
    /// write. Fails with `NotFound` when the target record does not exist and
    /// with `Validation` when an update would produce an invalid record.
    pub async fn apply_offline(&self, mutation: RosterMutation) -> Result<AppliedMutation, AppError> {
        self.apply(mutation, true).await
    }

    /// Applies the mutation to the stored roster without queueing it, unless
    /// it targets a record whose Create is still queued. Such a change is
    /// queued behind the Create so replay sends it once the record exists.
    pub async fn apply_online(&self, mutation: RosterMutation) -> Result<AppliedMutation, AppError> {
        self.apply(mutation, false).await
    }

    async fn apply(
        &self,
        mutation: RosterMutation,
        always_queue: bool,
    ) -> Result<AppliedMutation, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut roster = self.records.read_roster().await?;
        let mut operations = self.queue.read_operations().await?;

        let (record, kind, payload, awaits_create) = match mutation {
            RosterMutation::Insert(student) => {
                let stored = roster.insert(student);
                let payload = OperationPayload::Record(stored.clone());
                (stored, OperationKind::Create, payload, false)
            }
            RosterMutation::Update { id, patch } => {
                let existing = roster
                    .find(&id)
                    .ok_or_else(|| AppError::NotFound(format!("Student {id}")))?;
                validate_record(&existing.patched(&patch))?;
                let awaits_create = awaits_create(existing, &operations);
                let merged = roster
                    .update(&id, &patch)
                    .ok_or_else(|| AppError::NotFound(format!("Student {id}")))?;
                let payload = OperationPayload::Record(merged.clone());
                (merged, OperationKind::Update, payload, awaits_create)
            }
            RosterMutation::Delete { id } => {
                let removed = roster
                    .remove(&id)
                    .ok_or_else(|| AppError::NotFound(format!("Student {id}")))?;
                let awaits_create = awaits_create(&removed, &operations);
                let target = removed
                    .authoritative_id()
                    .map(str::to_string)
                    .unwrap_or(id);
                (
                    removed,
                    OperationKind::Delete,
                    OperationPayload::target(target),
                    awaits_create,
                )
            }
        };

        let mut entries = vec![LocalRecordStore::roster_entry(&roster)?];
        let operation = if always_queue || awaits_create {
            let operation = operations
                .push(kind, payload, Utc::now())
                .map_err(AppError::InvalidInput)?;
            entries.push(PendingOperationQueue::operations_entry(&operations)?);
            Some(operation)
        } else {
            None
        };
        self.kv.put_many(entries).await?;

        match &operation {
            Some(op) => debug!(id = %op.id, kind = %kind, "Queued roster mutation"),
            None => debug!(kind = %kind, "Applied roster mutation directly"),
        }
        Ok(AppliedMutation {
            record,
            operation,
            roster: roster.into_inner(),
        })
    }

    /// Removes a replayed entry. For a Create the roster record is reconciled
    /// to `server_id` and queued references to its local id are retargeted,
    /// all in the same write. Returns whether the entry was still queued.
    pub async fn complete_operation(
        &self,
        kind: OperationKind,
        id: OperationId,
        created: Option<(String, String)>,
    ) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut operations = self.queue.read_operations().await?;
        let removed = operations.remove(kind, id).is_some();

        let Some((local_id, server_id)) = created else {
            if removed {
                self.kv
                    .put_many(vec![PendingOperationQueue::operations_entry(&operations)?])
                    .await?;
            }
            return Ok(removed);
        };

        let mut roster: Roster = self.records.read_roster().await?;
        let reconciled = roster.reconcile(&local_id, &server_id);
        let retargeted = operations.retarget(&local_id, &server_id);
        debug!(
            local_id = %local_id,
            server_id = %server_id,
            reconciled,
            retargeted,
            "Reconciled created record"
        );

        let mut entries = vec![PendingOperationQueue::operations_entry(&operations)?];
        if reconciled {
            entries.push(LocalRecordStore::roster_entry(&roster)?);
        }
        self.kv.put_many(entries).await?;
        Ok(removed)
    }

    /// Returns whether the entry is now parked, `None` if it left the queue.
    pub async fn record_failure(
        &self,
        kind: OperationKind,
        id: OperationId,
        error: String,
        max_attempts: u32,
    ) -> Result<Option<bool>, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut operations = self.queue.read_operations().await?;
        let parked = operations.record_failure(kind, id, error, max_attempts);
        if parked.is_some() {
            self.queue.write_operations(&operations).await?;
        }
        Ok(parked)
    }
}

/// True when the record has never been created remotely and its Create is
/// still queued, so the backend cannot address it yet.
fn awaits_create(record: &Student, operations: &PendingOperations) -> bool {
    record.server_id.is_none()
        && record
            .local_id
            .as_deref()
            .is_some_and(|local_id| operations.has_pending_create_for(local_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::StudentDraft;
    use crate::infrastructure::storage::MemoryKeyValueStore;

    fn aris() -> Student {
        Student::from_draft(StudentDraft {
            name: "Aris".into(),
            age: 15,
            gender: "Male".into(),
            grade: "10th".into(),
            email: None,
            subject: None,
            photo: None,
        })
    }

    #[tokio::test]
    async fn test_offline_insert_changes_roster_and_queue_together() {
        let storage = OfflineStorage::new(Arc::new(MemoryKeyValueStore::new()));
        let applied = storage
            .apply_offline(RosterMutation::Insert(aris()))
            .await
            .unwrap();

        assert_eq!(applied.operation.unwrap().kind, OperationKind::Create);
        assert_eq!(storage.records().load().await, vec![applied.record.clone()]);
        assert_eq!(storage.queue().pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_missing_target_changes_nothing() {
        let storage = OfflineStorage::new(Arc::new(MemoryKeyValueStore::new()));
        let err = storage
            .apply_offline(RosterMutation::Delete { id: "ghost".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(storage.queue().pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_update_is_not_applied() {
        let storage = OfflineStorage::new(Arc::new(MemoryKeyValueStore::new()));
        let created = storage
            .apply_offline(RosterMutation::Insert(aris()))
            .await
            .unwrap();
        let id = created.record.local_id.clone().unwrap();

        let err = storage
            .apply_offline(RosterMutation::Update {
                id,
                patch: StudentPatch {
                    age: Some(99),
                    ..Default::default()
                },
            })
            .await
            .unwrap_err();
        assert!(err.validation_errors().is_some());
        assert_eq!(storage.records().load().await, vec![created.record]);
        assert_eq!(storage.queue().pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_completing_a_create_reconciles_and_retargets() {
        let storage = OfflineStorage::new(Arc::new(MemoryKeyValueStore::new()));
        let created = storage
            .apply_offline(RosterMutation::Insert(aris()))
            .await
            .unwrap();
        let local_id = created.record.local_id.clone().unwrap();
        let deleted = storage
            .apply_offline(RosterMutation::Delete {
                id: local_id.clone(),
            })
            .await
            .unwrap();

        assert!(storage
            .complete_operation(
                OperationKind::Create,
                created.operation.as_ref().unwrap().id,
                Some((local_id.clone(), "501".into())),
            )
            .await
            .unwrap());

        let delete = storage
            .queue()
            .find(OperationKind::Delete, deleted.operation.unwrap().id)
            .await
            .unwrap();
        assert_eq!(delete.target_id(), Some("501"));
        assert_eq!(storage.queue().pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_failures_park_at_the_limit() {
        let storage = OfflineStorage::new(Arc::new(MemoryKeyValueStore::new()));
        let applied = storage
            .apply_offline(RosterMutation::Insert(aris()))
            .await
            .unwrap();
        let id = applied.operation.unwrap().id;

        assert_eq!(
            storage
                .record_failure(OperationKind::Create, id, "500".into(), 2)
                .await
                .unwrap(),
            Some(false)
        );
        assert_eq!(
            storage
                .record_failure(OperationKind::Create, id, "500".into(), 2)
                .await
                .unwrap(),
            Some(true)
        );
        let op = storage.queue().find(OperationKind::Create, id).await.unwrap();
        assert!(op.parked);
        assert_eq!(op.attempts, 2);
        assert_eq!(op.last_error.as_deref(), Some("500"));
    }

    #[tokio::test]
    async fn test_online_change_keeps_committed_reconciliation() {
        let storage = OfflineStorage::new(Arc::new(MemoryKeyValueStore::new()));
        let created = storage
            .apply_offline(RosterMutation::Insert(aris()))
            .await
            .unwrap();
        let local_id = created.record.local_id.clone().unwrap();
        storage
            .complete_operation(
                OperationKind::Create,
                created.operation.unwrap().id,
                Some((local_id.clone(), "501".into())),
            )
            .await
            .unwrap();

        let mut other = aris();
        other.name = "Cara".into();
        let applied = storage
            .apply_online(RosterMutation::Insert(other))
            .await
            .unwrap();

        assert!(applied.operation.is_none());
        assert_eq!(storage.queue().pending_count().await, 0);
        let stored = storage.records().load().await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].server_id.as_deref(), Some("501"));
        assert_eq!(applied.roster, stored);
    }

    #[tokio::test]
    async fn test_online_change_to_uncreated_record_is_queued() {
        let storage = OfflineStorage::new(Arc::new(MemoryKeyValueStore::new()));
        let created = storage
            .apply_offline(RosterMutation::Insert(aris()))
            .await
            .unwrap();
        let local_id = created.record.local_id.clone().unwrap();

        let updated = storage
            .apply_online(RosterMutation::Update {
                id: local_id.clone(),
                patch: StudentPatch {
                    grade: Some("11th".into()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert_eq!(updated.operation.unwrap().kind, OperationKind::Update);

        let deleted = storage
            .apply_online(RosterMutation::Delete { id: local_id.clone() })
            .await
            .unwrap();
        let delete = deleted.operation.unwrap();
        assert_eq!(delete.target_id(), Some(local_id.as_str()));

        let counts = storage.queue().snapshot().await.counts;
        assert_eq!((counts.create, counts.update, counts.delete), (1, 1, 1));
        assert!(storage.records().load().await.is_empty());
    }
}
