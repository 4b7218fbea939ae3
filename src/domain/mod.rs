pub mod entities;
pub mod roster_query;
pub mod validation;
pub mod value_objects;

pub use entities::{
    ConnectivityMode, ConnectivityState, NetworkSignal, PendingOperation, Roster, Student,
    StudentDraft, StudentPatch,
};
pub use roster_query::{RosterFilter, RosterPage, RosterQuery};
pub use validation::{StudentForm, ValidationErrors};
pub use value_objects::{OperationId, OperationKind};
