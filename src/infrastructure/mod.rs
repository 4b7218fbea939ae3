pub mod backend;
pub mod database;
pub mod storage;
