pub mod connectivity;
pub mod pending_operation;
pub mod roster;
pub mod student;
pub mod sync_summary;

pub use connectivity::{ConnectivityMode, ConnectivityState, ConnectivityTransition, NetworkSignal};
pub use pending_operation::{
    OperationPayload, PendingCounts, PendingOperation, PendingOperations, PendingSnapshot,
};
pub use roster::Roster;
pub use student::{Student, StudentDraft, StudentPatch};
pub use sync_summary::{SyncOutcome, SyncStatus, SyncSummary};
