use crate::application::ports::KeyValueStore;
use crate::domain::entities::{Roster, Student, StudentPatch};
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub const ROSTER_KEY: &str = "students";

/// Keyed persistence of the roster. Writers serialize on a lock shared with
/// the pending queue so combined updates never interleave.
#[derive(Clone)]
pub struct LocalRecordStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl LocalRecordStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, write_lock: Arc<Mutex<()>>) -> Self {
        Self { kv, write_lock }
    }

    /// Stored roster, or empty when nothing is stored or it cannot be read.
    pub async fn load(&self) -> Vec<Student> {
        match self.read_roster().await {
            Ok(roster) => roster.into_inner(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored roster, treating it as empty");
                Vec::new()
            }
        }
    }

    pub async fn save(&self, students: Vec<Student>) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let (key, value) = Self::roster_entry(&Roster::new(students))?;
        self.kv.put(&key, value).await
    }

    pub async fn insert(&self, student: Student) -> Result<Student, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut roster = self.read_roster().await?;
        let stored = roster.insert(student);
        self.write_roster(&roster).await?;
        Ok(stored)
    }

    /// `None` when no record matches `id`; nothing is written then.
    pub async fn update(
        &self,
        id: &str,
        patch: &StudentPatch,
    ) -> Result<Option<Student>, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut roster = self.read_roster().await?;
        let Some(updated) = roster.update(id, patch) else {
            return Ok(None);
        };
        self.write_roster(&roster).await?;
        Ok(Some(updated))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut roster = self.read_roster().await?;
        if roster.remove(id).is_none() {
            return Ok(false);
        }
        self.write_roster(&roster).await?;
        Ok(true)
    }

    pub async fn reconcile(&self, local_id: &str, server_id: &str) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut roster = self.read_roster().await?;
        if !roster.reconcile(local_id, server_id) {
            return Ok(false);
        }
        self.write_roster(&roster).await?;
        Ok(true)
    }

    /// Reads without taking the write lock. Storage failures propagate so a
    /// read-modify-write never overwrites data it could not see; corrupt
    /// content is treated as empty.
    pub(crate) async fn read_roster(&self) -> Result<Roster, AppError> {
        let Some(raw) = self.kv.get(ROSTER_KEY).await? else {
            return Ok(Roster::default());
        };
        match serde_json::from_str::<Roster>(&raw) {
            Ok(roster) => Ok(roster),
            Err(e) => {
                warn!(error = %e, key = ROSTER_KEY, "Stored roster is corrupt, treating it as empty");
                Ok(Roster::default())
            }
        }
    }

    pub(crate) fn roster_entry(roster: &Roster) -> Result<(String, String), AppError> {
        let value = serde_json::to_string(roster)
            .map_err(|e| AppError::SerializationError(e.to_string()))?;
        Ok((ROSTER_KEY.to_string(), value))
    }

    async fn write_roster(&self, roster: &Roster) -> Result<(), AppError> {
        let (key, value) = Self::roster_entry(roster)?;
        self.kv.put(&key, value).await
    }
}
