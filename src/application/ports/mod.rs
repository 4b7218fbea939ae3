pub mod backend_probe;
pub mod key_value_store;
pub mod student_backend;

pub use backend_probe::BackendProbe;
pub use key_value_store::KeyValueStore;
pub use student_backend::StudentBackend;
