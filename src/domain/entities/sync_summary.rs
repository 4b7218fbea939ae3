use super::connectivity::ConnectivityMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub synced: usize,
    pub failed: usize,
    /// Updates and Deletes held back behind a Create that has not synced yet.
    pub deferred: usize,
    /// Entries parked during this pass.
    pub parked: usize,
    /// Queue size once the pass finished, parked entries included.
    pub remaining: usize,
}

impl SyncSummary {
    pub fn attempted(&self) -> usize {
        self.synced + self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SyncOutcome {
    Completed(SyncSummary),
    AlreadyRunning,
    Skipped { mode: ConnectivityMode },
}

impl SyncOutcome {
    pub fn summary(&self) -> Option<&SyncSummary> {
        match self {
            SyncOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_summary: Option<SyncSummary>,
    /// Failed replays accumulated over the lifetime of the synchronizer.
    pub sync_errors: u64,
}
