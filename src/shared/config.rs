use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub backend: BackendConfig,
    pub connectivity: ConnectivityConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    /// Seconds.
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    pub health_path: String,
    /// Seconds between periodic probes while the network is up.
    pub probe_interval: u64,
    /// Seconds; probes started sooner than this after the previous one are throttled.
    pub min_probe_interval: u64,
    /// Seconds.
    pub probe_timeout: u64,
    /// Initial platform reachability when no platform signal source is attached.
    pub assume_network_up: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    /// Failed replays before an operation is parked for manual intervention.
    pub max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./data/roster.db?mode=rwc".to_string(),
                max_connections: 5,
            },
            backend: BackendConfig {
                base_url: "http://localhost:8080/api".to_string(),
                request_timeout: 10,
            },
            connectivity: ConnectivityConfig::default(),
            sync: SyncConfig {
                auto_sync: true,
                max_attempts: 5,
            },
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            health_path: "health".to_string(),
            probe_interval: 30,
            min_probe_interval: 10,
            probe_timeout: 5,
            assume_network_up: true,
        }
    }
}

impl ConnectivityConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval)
    }

    pub fn min_probe_interval(&self) -> Duration {
        Duration::from_secs(self.min_probe_interval)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("ROSTER_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Some(value) = env_parsed("ROSTER_DATABASE_MAX_CONNECTIONS", parse_u32) {
            cfg.database.max_connections = value;
        }

        if let Ok(v) = std::env::var("ROSTER_BACKEND_URL") {
            if !v.trim().is_empty() {
                cfg.backend.base_url = v.trim().to_string();
            }
        }
        if let Some(value) = env_parsed("ROSTER_BACKEND_TIMEOUT_SECS", parse_u64) {
            cfg.backend.request_timeout = value;
        }

        if let Ok(v) = std::env::var("ROSTER_HEALTH_PATH") {
            let path = v.trim().trim_start_matches('/');
            if !path.is_empty() {
                cfg.connectivity.health_path = path.to_string();
            }
        }
        if let Some(value) = env_parsed("ROSTER_PROBE_INTERVAL_SECS", parse_u64) {
            cfg.connectivity.probe_interval = value;
        }
        if let Some(value) = env_parsed("ROSTER_MIN_PROBE_INTERVAL_SECS", parse_u64) {
            cfg.connectivity.min_probe_interval = value;
        }
        if let Some(value) = env_parsed("ROSTER_PROBE_TIMEOUT_SECS", parse_u64) {
            cfg.connectivity.probe_timeout = value;
        }
        if let Ok(v) = std::env::var("ROSTER_ASSUME_NETWORK_UP") {
            cfg.connectivity.assume_network_up =
                parse_bool(&v, cfg.connectivity.assume_network_up);
        }

        if let Ok(v) = std::env::var("ROSTER_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = env_parsed("ROSTER_SYNC_MAX_ATTEMPTS", parse_u32) {
            cfg.sync.max_attempts = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.backend.base_url.trim().is_empty() {
            return Err("Backend base_url must not be empty".to_string());
        }
        if let Err(e) = reqwest::Url::parse(&self.backend.base_url) {
            return Err(format!("Backend base_url is not a valid URL: {e}"));
        }
        if self.connectivity.probe_timeout == 0 {
            return Err("Connectivity probe_timeout must be greater than 0".to_string());
        }
        if self.connectivity.probe_interval == 0 {
            return Err("Connectivity probe_interval must be greater than 0".to_string());
        }
        if self.connectivity.min_probe_interval > self.connectivity.probe_interval {
            return Err(
                "Connectivity min_probe_interval must not exceed probe_interval".to_string(),
            );
        }
        if self.sync.max_attempts == 0 {
            return Err("Sync max_attempts must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn env_parsed<T>(key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    std::env::var(key).ok().and_then(|v| parse(&v))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
