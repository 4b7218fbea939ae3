use crate::application::ports::BackendProbe;
use crate::domain::entities::{
    ConnectivityMode, ConnectivityState, ConnectivityTransition, NetworkSignal,
};
use crate::shared::config::ConnectivityConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TRANSITION_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub interval: Duration,
    pub min_interval: Duration,
    pub timeout: Duration,
}

impl From<&ConnectivityConfig> for ProbeSettings {
    fn from(config: &ConnectivityConfig) -> Self {
        Self {
            interval: config.probe_interval(),
            min_interval: config.min_probe_interval(),
            timeout: config.probe_timeout(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from(&ConnectivityConfig::default())
    }
}

#[derive(Debug, Default)]
struct ProbeBookkeeping {
    /// Generation handed to the most recently started probe.
    started: u64,
    /// Generation of the newest probe whose result was applied.
    applied: u64,
    /// Bumped on every network-down signal.
    network_epoch: u64,
    last_probe_at: Option<Instant>,
}

/// Tracks network reachability and backend liveness. The cached state is
/// readable without blocking; transitions are broadcast to subscribers.
pub struct ConnectivityMonitor {
    probe: Arc<dyn BackendProbe>,
    settings: ProbeSettings,
    state: watch::Sender<ConnectivityState>,
    transitions: broadcast::Sender<ConnectivityTransition>,
    bookkeeping: Mutex<ProbeBookkeeping>,
}

impl ConnectivityMonitor {
    /// Backend reachability starts out false until the first probe.
    pub fn new(probe: Arc<dyn BackendProbe>, settings: ProbeSettings, network_up: bool) -> Self {
        let (state, _) = watch::channel(ConnectivityState::new(network_up, false));
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            probe,
            settings,
            state,
            transitions,
            bookkeeping: Mutex::new(ProbeBookkeeping::default()),
        }
    }

    pub fn settings(&self) -> ProbeSettings {
        self.settings
    }

    pub fn current_state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn mode(&self) -> ConnectivityMode {
        self.current_state().mode()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityTransition> {
        self.transitions.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Probes immediately, ignoring the throttle.
    pub async fn refresh(&self) -> ConnectivityState {
        self.probe_backend(false).await
    }

    pub async fn handle_network_signal(&self, signal: NetworkSignal) -> ConnectivityState {
        match signal {
            NetworkSignal::Down => {
                let mut bookkeeping = self.bookkeeping.lock().await;
                bookkeeping.network_epoch += 1;
                self.apply(ConnectivityState::offline());
                self.current_state()
            }
            NetworkSignal::Up => {
                {
                    let _bookkeeping = self.bookkeeping.lock().await;
                    if !self.current_state().network_reachable {
                        self.apply(ConnectivityState::degraded());
                    }
                }
                self.probe_backend(true).await
            }
        }
    }

    pub fn spawn_signal_listener(
        self: &Arc<Self>,
        mut signals: mpsc::Receiver<NetworkSignal>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    signal = signals.recv() => match signal {
                        Some(signal) => {
                            debug!(?signal, "Received network signal");
                            monitor.handle_network_signal(signal).await;
                        }
                        None => break,
                    },
                }
            }
            debug!("Network signal listener stopped");
        })
    }

    pub fn spawn_periodic_probe(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let period = monitor.settings.interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if monitor.mode() == ConnectivityMode::Offline {
                            continue;
                        }
                        monitor.probe_backend(true).await;
                    }
                }
            }
            debug!("Periodic probe stopped");
        })
    }

    async fn probe_backend(&self, throttled: bool) -> ConnectivityState {
        let (generation, epoch) = {
            let mut bookkeeping = self.bookkeeping.lock().await;
            if !self.current_state().network_reachable {
                return self.current_state();
            }
            let now = Instant::now();
            if throttled {
                if let Some(last) = bookkeeping.last_probe_at {
                    if now.duration_since(last) < self.settings.min_interval {
                        debug!("Probe throttled, returning cached state");
                        return self.current_state();
                    }
                }
            }
            bookkeeping.started += 1;
            bookkeeping.last_probe_at = Some(now);
            (bookkeeping.started, bookkeeping.network_epoch)
        };

        let reachable = match tokio::time::timeout(self.settings.timeout, self.probe.probe()).await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Backend probe failed");
                false
            }
            Err(_) => {
                warn!(timeout = ?self.settings.timeout, "Backend probe timed out");
                false
            }
        };

        let mut bookkeeping = self.bookkeeping.lock().await;
        if bookkeeping.network_epoch != epoch || generation < bookkeeping.applied {
            debug!(generation, "Discarding stale probe result");
            return self.current_state();
        }
        bookkeeping.applied = generation;
        let current = self.current_state();
        self.apply(ConnectivityState::new(current.network_reachable, reachable));
        self.current_state()
    }

    /// Callers hold the bookkeeping lock so state changes stay ordered.
    fn apply(&self, next: ConnectivityState) {
        let previous = self.state.send_replace(next);
        if previous == next {
            return;
        }
        info!(from = %previous.mode(), to = %next.mode(), "Connectivity changed");
        let _ = self.transitions.send(ConnectivityTransition {
            previous,
            current: next,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::AppError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubProbe {
        healthy: AtomicBool,
        calls: AtomicUsize,
    }

    impl StubProbe {
        fn new(healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                healthy: AtomicBool::new(healthy),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BackendProbe for StubProbe {
        async fn probe(&self) -> Result<(), AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(AppError::Network("connection refused".into()))
            }
        }
    }

    fn settings() -> ProbeSettings {
        ProbeSettings {
            interval: Duration::from_secs(30),
            min_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_default_settings_follow_connectivity_defaults() {
        let defaults = ProbeSettings::default();
        assert_eq!(defaults.interval, Duration::from_secs(30));
        assert_eq!(defaults.min_interval, Duration::from_secs(10));
        assert_eq!(defaults.timeout, Duration::from_secs(5));
        assert_eq!(
            defaults,
            ProbeSettings::from(&crate::shared::config::AppConfig::default().connectivity)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_backend_is_unreachable() {
        let monitor = ConnectivityMonitor::new(StubProbe::new(true), settings(), true);
        assert_eq!(monitor.mode(), ConnectivityMode::Degraded);
        assert_eq!(monitor.refresh().await, ConnectivityState::online());
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_down_skips_probe() {
        let probe = StubProbe::new(true);
        let monitor = ConnectivityMonitor::new(probe.clone(), settings(), true);
        let state = monitor.handle_network_signal(NetworkSignal::Down).await;
        assert_eq!(state, ConnectivityState::offline());
        assert_eq!(monitor.refresh().await, ConnectivityState::offline());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_up_probes_are_throttled() {
        let probe = StubProbe::new(true);
        let monitor = ConnectivityMonitor::new(probe.clone(), settings(), false);

        assert!(monitor.handle_network_signal(NetworkSignal::Up).await.is_online());
        monitor.handle_network_signal(NetworkSignal::Down).await;
        probe.healthy.store(false, Ordering::SeqCst);

        let state = monitor.handle_network_signal(NetworkSignal::Up).await;
        assert_eq!(state, ConnectivityState::degraded());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        monitor.handle_network_signal(NetworkSignal::Up).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_are_broadcast() {
        let monitor = ConnectivityMonitor::new(StubProbe::new(true), settings(), true);
        let mut transitions = monitor.subscribe();

        monitor.refresh().await;
        let transition = transitions.recv().await.unwrap();
        assert!(transition.came_online());

        monitor.handle_network_signal(NetworkSignal::Down).await;
        let transition = transitions.recv().await.unwrap();
        assert_eq!(transition.current.mode(), ConnectivityMode::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_probe_skips_while_offline() {
        let probe = StubProbe::new(true);
        let monitor = Arc::new(ConnectivityMonitor::new(probe.clone(), settings(), false));
        let cancel = CancellationToken::new();
        let handle = monitor.spawn_periodic_probe(cancel.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

        monitor.handle_network_signal(NetworkSignal::Up).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(probe.calls.load(Ordering::SeqCst) >= 2);

        cancel.cancel();
        handle.await.unwrap();
    }
}
