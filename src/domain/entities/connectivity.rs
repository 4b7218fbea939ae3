use serde::{Deserialize, Serialize};
use std::fmt;

/// Cached reachability tuple. Backend reachability is meaningless without the
/// network, so the constructor forces it to false in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    pub network_reachable: bool,
    pub backend_reachable: bool,
}

impl ConnectivityState {
    pub fn new(network_reachable: bool, backend_reachable: bool) -> Self {
        Self {
            network_reachable,
            backend_reachable: network_reachable && backend_reachable,
        }
    }

    pub fn online() -> Self {
        Self::new(true, true)
    }

    pub fn degraded() -> Self {
        Self::new(true, false)
    }

    pub fn offline() -> Self {
        Self::new(false, false)
    }

    pub fn mode(&self) -> ConnectivityMode {
        match (self.network_reachable, self.backend_reachable) {
            (true, true) => ConnectivityMode::Online,
            (true, false) => ConnectivityMode::Degraded,
            (false, _) => ConnectivityMode::Offline,
        }
    }

    pub fn is_online(&self) -> bool {
        self.mode() == ConnectivityMode::Online
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (network: {}, backend: {})",
            self.mode(),
            self.network_reachable,
            self.backend_reachable
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMode {
    Online,
    Degraded,
    Offline,
}

impl ConnectivityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityMode::Online => "online",
            ConnectivityMode::Degraded => "degraded",
            ConnectivityMode::Offline => "offline",
        }
    }
}

impl fmt::Display for ConnectivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityTransition {
    pub previous: ConnectivityState,
    pub current: ConnectivityState,
}

impl ConnectivityTransition {
    pub fn came_online(&self) -> bool {
        !self.previous.is_online() && self.current.is_online()
    }

    pub fn mode_changed(&self) -> bool {
        self.previous.mode() != self.current.mode()
    }
}

/// Platform reachability notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSignal {
    Up,
    Down,
}
