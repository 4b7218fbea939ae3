pub mod connectivity_monitor;
pub mod offline_data;
pub mod offline_storage;
pub mod pending_queue;
pub mod record_store;
pub mod synchronizer;

pub use connectivity_monitor::{ConnectivityMonitor, ProbeSettings};
pub use offline_data::{OfflineDataService, Route, Routed};
pub use offline_storage::{AppliedMutation, OfflineStorage, RosterMutation};
pub use pending_queue::{PENDING_OPERATIONS_KEY, PendingOperationQueue};
pub use record_store::{LocalRecordStore, ROSTER_KEY};
pub use synchronizer::Synchronizer;
