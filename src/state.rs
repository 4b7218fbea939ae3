use crate::application::ports::{BackendProbe, KeyValueStore, StudentBackend};
use crate::application::services::{
    ConnectivityMonitor, OfflineDataService, OfflineStorage, ProbeSettings, Synchronizer,
};
use crate::domain::entities::NetworkSignal;
use crate::infrastructure::backend::{HttpBackendProbe, HttpStudentBackend};
use crate::infrastructure::database::Database;
use crate::infrastructure::storage::SqliteKeyValueStore;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const NETWORK_SIGNAL_BUFFER: usize = 16;

/// Wires the services together and owns the background task lifecycle.
pub struct AppState {
    pub config: AppConfig,
    pub backend: Arc<dyn StudentBackend>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub storage: OfflineStorage,
    pub synchronizer: Arc<Synchronizer>,
    pub data: Arc<OfflineDataService>,
    network_tx: mpsc::Sender<NetworkSignal>,
    network_rx: Mutex<Option<mpsc::Receiver<NetworkSignal>>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        config.validate().map_err(AppError::ConfigurationError)?;

        let pool = Database::initialize(&config.database.url, config.database.max_connections).await?;
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(pool));
        let backend: Arc<dyn StudentBackend> = Arc::new(HttpStudentBackend::from_config(&config)?);
        let probe: Arc<dyn BackendProbe> = Arc::new(HttpBackendProbe::from_config(&config)?);

        Ok(Self::with_components(config, kv, backend, probe))
    }

    pub fn with_components(
        config: AppConfig,
        kv: Arc<dyn KeyValueStore>,
        backend: Arc<dyn StudentBackend>,
        probe: Arc<dyn BackendProbe>,
    ) -> Self {
        let monitor = Arc::new(ConnectivityMonitor::new(
            probe,
            ProbeSettings::from(&config.connectivity),
            config.connectivity.assume_network_up,
        ));
        let storage = OfflineStorage::new(kv);
        let synchronizer = Arc::new(Synchronizer::new(
            storage.clone(),
            backend.clone(),
            config.sync.max_attempts,
        ));
        let data = Arc::new(OfflineDataService::new(
            monitor.clone(),
            storage.clone(),
            synchronizer.clone(),
        ));
        let (network_tx, network_rx) = mpsc::channel(NETWORK_SIGNAL_BUFFER);

        Self {
            config,
            backend,
            monitor,
            storage,
            synchronizer,
            data,
            network_tx,
            network_rx: Mutex::new(Some(network_rx)),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Sender the platform layer reports reachability changes through.
    pub fn network_signals(&self) -> mpsc::Sender<NetworkSignal> {
        self.network_tx.clone()
    }

    /// Starts the signal listener, the periodic probe and, when enabled,
    /// auto-sync, then probes once so the first state is known. Returns
    /// false without spawning anything when already started.
    pub async fn start(&self) -> bool {
        let mut tasks = self.tasks.lock().await;
        let Some(rx) = self.network_rx.lock().await.take() else {
            warn!("Background tasks already started");
            return false;
        };
        tasks.push(self.monitor.spawn_signal_listener(rx, self.cancel.clone()));
        tasks.push(self.monitor.spawn_periodic_probe(self.cancel.clone()));
        if self.config.sync.auto_sync {
            tasks.push(self.data.spawn_auto_sync(self.cancel.clone()));
        }
        drop(tasks);

        let state = self.monitor.refresh().await;
        info!(mode = %state.mode(), "Roster sync started");
        true
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Roster sync stopped");
    }
}
