pub mod error;
pub mod http_backend;

pub use error::BackendError;
pub use http_backend::{HttpBackendProbe, HttpStudentBackend};
