pub mod ports;
pub mod services;

pub use services::{
    ConnectivityMonitor, LocalRecordStore, OfflineDataService, OfflineStorage,
    PendingOperationQueue, Synchronizer,
};
