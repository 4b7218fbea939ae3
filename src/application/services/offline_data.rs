use super::connectivity_monitor::ConnectivityMonitor;
use super::offline_storage::{OfflineStorage, RosterMutation};
use super::synchronizer::Synchronizer;
use crate::domain::entities::{
    ConnectivityState, ConnectivityTransition, PendingSnapshot, Roster, Student, StudentDraft,
    StudentPatch, SyncOutcome, SyncStatus,
};
use crate::domain::roster_query::{self, GradeCount, RosterPage, RosterQuery};
use crate::domain::validation::validate_draft;
use crate::domain::value_objects::OperationId;
use crate::shared::error::AppError;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a mutation went. `Direct` means the caller still owes the backend
/// call; `Queued` means the synchronizer will replay it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "operationId", rename_all = "camelCase")]
pub enum Route {
    Direct,
    Queued(OperationId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Routed<T> {
    pub value: T,
    pub route: Route,
}

impl<T> Routed<T> {
    pub fn is_queued(&self) -> bool {
        matches!(self.route, Route::Queued(_))
    }
}

/// Offline-aware entry point for the UI. Reads come from the in-memory
/// roster; mutations are routed by the monitor's cached connectivity.
pub struct OfflineDataService {
    monitor: Arc<ConnectivityMonitor>,
    storage: OfflineStorage,
    synchronizer: Arc<Synchronizer>,
    roster: RwLock<Roster>,
}

impl OfflineDataService {
    pub fn new(
        monitor: Arc<ConnectivityMonitor>,
        storage: OfflineStorage,
        synchronizer: Arc<Synchronizer>,
    ) -> Self {
        Self {
            monitor,
            storage,
            synchronizer,
            roster: RwLock::new(Roster::default()),
        }
    }

    /// Online: adopt `initial` and write it through. Otherwise load the
    /// stored roster, seeding it with `initial` when nothing is stored.
    pub async fn initialize(&self, initial: Vec<Student>) -> Result<(), AppError> {
        let mut roster = self.roster.write().await;
        if self.is_online() {
            self.storage.records().save(initial.clone()).await?;
            *roster = Roster::new(initial);
            return Ok(());
        }

        let mut stored = self.storage.records().load().await;
        if stored.is_empty() && !initial.is_empty() {
            self.storage.records().save(initial.clone()).await?;
            stored = initial;
        }
        info!(records = stored.len(), "Loaded roster from local storage");
        *roster = Roster::new(stored);
        Ok(())
    }

    pub async fn add_item(&self, draft: StudentDraft) -> Result<Routed<Student>, AppError> {
        validate_draft(&draft)?;
        self.apply(RosterMutation::Insert(Student::from_draft(draft)))
            .await
    }

    pub async fn update_item(
        &self,
        id: &str,
        patch: StudentPatch,
    ) -> Result<Routed<Student>, AppError> {
        self.apply(RosterMutation::Update {
            id: id.to_string(),
            patch,
        })
        .await
    }

    /// Returns the removed record.
    pub async fn delete_item(&self, id: &str) -> Result<Routed<Student>, AppError> {
        self.apply(RosterMutation::Delete { id: id.to_string() })
            .await
    }

    /// Records the server id an online caller obtained for a record it added.
    pub async fn reconcile_item(&self, local_id: &str, server_id: &str) -> Result<bool, AppError> {
        let mut roster = self.roster.write().await;
        if !self.storage.records().reconcile(local_id, server_id).await? {
            return Ok(false);
        }
        *roster = self.storage.records().read_roster().await?;
        Ok(true)
    }

    /// Replays the queue when online, then reloads the roster from storage.
    pub async fn sync_data(&self) -> Result<SyncOutcome, AppError> {
        let state = self.monitor.current_state();
        if !state.is_online() {
            debug!(mode = %state.mode(), "Not online, skipping sync");
            return Ok(SyncOutcome::Skipped { mode: state.mode() });
        }

        let outcome = self.synchronizer.sync().await?;
        if let SyncOutcome::Completed(_) = outcome {
            let mut roster = self.roster.write().await;
            *roster = self.storage.records().read_roster().await?;
        }
        Ok(outcome)
    }

    /// Runs a sync pass on every transition into online.
    pub fn spawn_auto_sync(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut transitions = self.monitor.subscribe();
        tokio::spawn(async move {
            loop {
                let trigger = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = transitions.recv() => match received {
                        Ok(transition) => transition.came_online(),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Missed connectivity transitions");
                            service.is_online()
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                if !trigger {
                    continue;
                }
                match service.sync_data().await {
                    Ok(outcome) => debug!(?outcome, "Automatic sync finished"),
                    Err(e) => warn!(error = %e, "Automatic sync failed"),
                }
            }
            debug!("Auto-sync stopped");
        })
    }

    pub async fn clear_pending_operations(&self) -> Result<(), AppError> {
        self.storage.queue().clear().await
    }

    pub async fn retry_parked(&self) -> Result<usize, AppError> {
        self.storage.queue().release_parked().await
    }

    pub async fn data(&self) -> Vec<Student> {
        self.roster.read().await.as_slice().to_vec()
    }

    pub async fn find(&self, id: &str) -> Option<Student> {
        self.roster.read().await.find(id).cloned()
    }

    pub async fn query(&self, query: &RosterQuery) -> Result<RosterPage, AppError> {
        query
            .run(self.roster.read().await.as_slice())
            .map_err(AppError::InvalidInput)
    }

    pub async fn grade_distribution(&self) -> Vec<GradeCount> {
        roster_query::grade_distribution(self.roster.read().await.as_slice())
    }

    pub fn is_offline(&self) -> bool {
        !self.is_online()
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.monitor.current_state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityTransition> {
        self.monitor.subscribe()
    }

    pub async fn pending_operations_count(&self) -> usize {
        self.storage.queue().pending_count().await
    }

    pub async fn pending_operations(&self) -> PendingSnapshot {
        self.storage.queue().snapshot().await
    }

    pub async fn sync_status(&self) -> SyncStatus {
        self.synchronizer.status().await
    }

    fn is_online(&self) -> bool {
        self.monitor.current_state().is_online()
    }

    /// Mutations serialize on the roster lock and always start from the
    /// stored roster, which a running sync pass may have reconciled.
    async fn apply(&self, mutation: RosterMutation) -> Result<Routed<Student>, AppError> {
        let mut roster = self.roster.write().await;
        let applied = if self.is_online() {
            self.storage.apply_online(mutation).await?
        } else {
            self.storage.apply_offline(mutation).await?
        };
        *roster = Roster::new(applied.roster);
        let route = match applied.operation {
            Some(operation) => Route::Queued(operation.id),
            None => Route::Direct,
        };
        Ok(Routed {
            value: applied.record,
            route,
        })
    }
}
