use super::student::Student;
use crate::domain::value_objects::{OperationId, OperationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationPayload {
    Record(Student),
    Target { id: String },
}

impl OperationPayload {
    pub fn target(id: impl Into<String>) -> Self {
        OperationPayload::Target { id: id.into() }
    }

    pub fn record(&self) -> Option<&Student> {
        match self {
            OperationPayload::Record(student) => Some(student),
            OperationPayload::Target { .. } => None,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        match self {
            OperationPayload::Record(student) => student.authoritative_id(),
            OperationPayload::Target { id } => Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub timestamp: DateTime<Utc>,
    pub payload: OperationPayload,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub parked: bool,
}

impl PendingOperation {
    pub fn target_id(&self) -> Option<&str> {
        self.payload.target_id()
    }

    /// Local id this operation still refers to because its record has no
    /// server id yet.
    pub fn unresolved_local_id(&self) -> Option<&str> {
        match &self.payload {
            OperationPayload::Record(student) if student.server_id.is_none() => {
                student.local_id.as_deref()
            }
            OperationPayload::Record(_) => None,
            OperationPayload::Target { id } => Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCounts {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub parked: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSnapshot {
    pub counts: PendingCounts,
    pub create: Vec<PendingOperation>,
    pub update: Vec<PendingOperation>,
    pub delete: Vec<PendingOperation>,
}

/// The persisted queue: one arrival-ordered sequence per kind plus the id
/// high-water mark, which survives `clear()` so ids never repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperations {
    #[serde(default)]
    create: Vec<PendingOperation>,
    #[serde(default)]
    update: Vec<PendingOperation>,
    #[serde(default)]
    delete: Vec<PendingOperation>,
    #[serde(default)]
    last_id: u64,
}

impl PendingOperations {
    pub fn sequence(&self, kind: OperationKind) -> &[PendingOperation] {
        match kind {
            OperationKind::Create => &self.create,
            OperationKind::Update => &self.update,
            OperationKind::Delete => &self.delete,
        }
    }

    fn sequence_mut(&mut self, kind: OperationKind) -> &mut Vec<PendingOperation> {
        match kind {
            OperationKind::Create => &mut self.create,
            OperationKind::Update => &mut self.update,
            OperationKind::Delete => &mut self.delete,
        }
    }

    fn all(&self) -> impl Iterator<Item = &PendingOperation> {
        self.create
            .iter()
            .chain(self.update.iter())
            .chain(self.delete.iter())
    }

    fn all_mut(&mut self) -> impl Iterator<Item = &mut PendingOperation> {
        self.create
            .iter_mut()
            .chain(self.update.iter_mut())
            .chain(self.delete.iter_mut())
    }

    fn high_water_mark(&self) -> u64 {
        self.all()
            .map(|op| op.id.value())
            .max()
            .unwrap_or(0)
            .max(self.last_id)
    }

    pub fn push(
        &mut self,
        kind: OperationKind,
        payload: OperationPayload,
        timestamp: DateTime<Utc>,
    ) -> Result<PendingOperation, String> {
        if payload.record().is_some() != kind.carries_record() {
            return Err(format!(
                "{kind} operations require a {} payload",
                if kind.carries_record() { "record" } else { "target id" }
            ));
        }

        let id = OperationId::new(self.high_water_mark().saturating_add(1))?;
        self.last_id = id.value();

        let operation = PendingOperation {
            id,
            kind,
            timestamp,
            payload,
            attempts: 0,
            last_error: None,
            parked: false,
        };
        self.sequence_mut(kind).push(operation.clone());
        Ok(operation)
    }

    pub fn get(&self, kind: OperationKind, id: OperationId) -> Option<&PendingOperation> {
        self.sequence(kind).iter().find(|op| op.id == id)
    }

    pub fn remove(&mut self, kind: OperationKind, id: OperationId) -> Option<PendingOperation> {
        let sequence = self.sequence_mut(kind);
        let index = sequence.iter().position(|op| op.id == id)?;
        Some(sequence.remove(index))
    }

    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn parked_len(&self) -> usize {
        self.all().filter(|op| op.parked).count()
    }

    pub fn active_len(&self) -> usize {
        self.len() - self.parked_len()
    }

    /// Non-parked entries: every Create, then every Update, then every
    /// Delete, each oldest first.
    pub fn replay_order(&self) -> Vec<(OperationKind, OperationId)> {
        OperationKind::REPLAY_ORDER
            .iter()
            .flat_map(|&kind| {
                let mut ids: Vec<OperationId> = self
                    .sequence(kind)
                    .iter()
                    .filter(|op| !op.parked)
                    .map(|op| op.id)
                    .collect();
                ids.sort();
                ids.into_iter().map(move |id| (kind, id))
            })
            .collect()
    }

    pub fn has_pending_create_for(&self, local_id: &str) -> bool {
        self.create.iter().any(|op| {
            op.payload
                .record()
                .and_then(|s| s.local_id.as_deref())
                .is_some_and(|id| id == local_id)
        })
    }

    /// Returns whether the entry is now parked, or `None` if it is gone.
    pub fn record_failure(
        &mut self,
        kind: OperationKind,
        id: OperationId,
        error: String,
        max_attempts: u32,
    ) -> Option<bool> {
        let operation = self.sequence_mut(kind).iter_mut().find(|op| op.id == id)?;
        operation.attempts = operation.attempts.saturating_add(1);
        operation.last_error = Some(error);
        if operation.attempts >= max_attempts {
            operation.parked = true;
        }
        Some(operation.parked)
    }

    /// Points queued Updates and Deletes that still use `local_id` at the
    /// server-issued id.
    pub fn retarget(&mut self, local_id: &str, server_id: &str) -> usize {
        let mut rewritten = 0;
        for operation in self.update.iter_mut() {
            if let OperationPayload::Record(student) = &mut operation.payload {
                if student.server_id.is_none() && student.local_id.as_deref() == Some(local_id) {
                    student.server_id = Some(server_id.to_string());
                    rewritten += 1;
                }
            }
        }
        for operation in self.delete.iter_mut() {
            if let OperationPayload::Target { id } = &mut operation.payload {
                if id == local_id {
                    *id = server_id.to_string();
                    rewritten += 1;
                }
            }
        }
        rewritten
    }

    pub fn release_parked(&mut self) -> usize {
        let mut released = 0;
        for operation in self.all_mut().filter(|op| op.parked) {
            operation.parked = false;
            operation.attempts = 0;
            released += 1;
        }
        released
    }

    pub fn clear(&mut self) {
        self.last_id = self.high_water_mark();
        self.create.clear();
        self.update.clear();
        self.delete.clear();
    }

    pub fn counts(&self) -> PendingCounts {
        PendingCounts {
            create: self.create.len(),
            update: self.update.len(),
            delete: self.delete.len(),
            parked: self.parked_len(),
            total: self.len(),
        }
    }

    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            counts: self.counts(),
            create: self.create.clone(),
            update: self.update.clone(),
            delete: self.delete.clone(),
        }
    }
}
