pub mod operation_id;
pub mod operation_kind;

pub use operation_id::OperationId;
pub use operation_kind::OperationKind;
