#![allow(dead_code)]

use async_trait::async_trait;
use roster_sync_lib::application::ports::{BackendProbe, KeyValueStore, StudentBackend};
use roster_sync_lib::domain::entities::{Student, StudentDraft};
use roster_sync_lib::infrastructure::storage::MemoryKeyValueStore;
use roster_sync_lib::shared::config::AppConfig;
use roster_sync_lib::shared::error::AppError;
use roster_sync_lib::state::AppState;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub fn draft(name: &str, age: u32, grade: &str) -> StudentDraft {
    StudentDraft {
        name: name.to_string(),
        age,
        gender: "Female".to_string(),
        grade: grade.to_string(),
        email: None,
        subject: None,
        photo: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Create(String),
    Update(String),
    Delete(String),
}

/// Records every call; each kind can be told to fail.
pub struct MockBackend {
    calls: Mutex<Vec<BackendCall>>,
    next_id: AtomicU64,
    pub accept_creates: AtomicBool,
    pub accept_updates: AtomicBool,
    pub accept_deletes: AtomicBool,
    latency: Option<Duration>,
}

impl MockBackend {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::build(true, None))
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self::build(false, None))
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self::build(true, Some(latency)))
    }

    fn build(accept: bool, latency: Option<Duration>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(500),
            accept_creates: AtomicBool::new(accept),
            accept_updates: AtomicBool::new(accept),
            accept_deletes: AtomicBool::new(accept),
            latency,
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn respond(&self, accept: &AtomicBool) -> Result<(), AppError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if accept.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Backend("status 500".to_string()))
        }
    }
}

#[async_trait]
impl StudentBackend for MockBackend {
    async fn create_student(&self, student: &Student) -> Result<Student, AppError> {
        self.record(BackendCall::Create(student.name.clone()));
        self.respond(&self.accept_creates).await?;
        let mut created = student.clone();
        created.server_id = Some((self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string());
        Ok(created)
    }

    async fn update_student(&self, id: &str, _student: &Student) -> Result<(), AppError> {
        self.record(BackendCall::Update(id.to_string()));
        self.respond(&self.accept_updates).await
    }

    async fn delete_student(&self, id: &str) -> Result<(), AppError> {
        self.record(BackendCall::Delete(id.to_string()));
        self.respond(&self.accept_deletes).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProbeStep {
    /// `None` never answers.
    pub delay: Option<Duration>,
    pub healthy: bool,
}

/// Answers from a script first, then from the `healthy` flag.
pub struct MockProbe {
    pub healthy: AtomicBool,
    script: Mutex<VecDeque<ProbeStep>>,
    calls: AtomicUsize,
}

impl MockProbe {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    pub fn unhealthy() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    pub fn scripted(steps: Vec<ProbeStep>) -> Arc<Self> {
        let probe = Self::build(true);
        *probe.script.lock().unwrap() = steps.into();
        Arc::new(probe)
    }

    fn build(healthy: bool) -> Self {
        Self {
            healthy: AtomicBool::new(healthy),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendProbe for MockProbe {
    async fn probe(&self) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        let healthy = match step {
            Some(ProbeStep { delay: None, .. }) => std::future::pending::<bool>().await,
            Some(ProbeStep {
                delay: Some(delay),
                healthy,
            }) => {
                tokio::time::sleep(delay).await;
                healthy
            }
            None => self.healthy.load(Ordering::SeqCst),
        };
        if healthy {
            Ok(())
        } else {
            Err(AppError::Network("connection refused".to_string()))
        }
    }
}

/// In-memory store whose writes can be switched to fail.
#[derive(Default)]
pub struct FlakyKeyValueStore {
    inner: MemoryKeyValueStore,
    pub fail_writes: AtomicBool,
}

impl FlakyKeyValueStore {
    fn check(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(AppError::Storage("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<(), AppError> {
        self.check()?;
        self.inner.put(key, value).await
    }

    async fn put_many(&self, entries: Vec<(String, String)>) -> Result<(), AppError> {
        self.check()?;
        self.inner.put_many(entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.check()?;
        self.inner.remove(key).await
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.sync.auto_sync = false;
    config
}

pub struct TestContext {
    pub state: AppState,
    pub backend: Arc<MockBackend>,
    pub probe: Arc<MockProbe>,
    pub kv: Arc<FlakyKeyValueStore>,
}

/// Builds an app over mocks. The network starts down when `network_up` is false.
pub fn setup(
    network_up: bool,
    backend: Arc<MockBackend>,
    probe: Arc<MockProbe>,
    config: AppConfig,
) -> TestContext {
    let mut config = config;
    config.connectivity.assume_network_up = network_up;
    let kv = Arc::new(FlakyKeyValueStore::default());
    let state = AppState::with_components(config, kv.clone(), backend.clone(), probe.clone());
    TestContext {
        state,
        backend,
        probe,
        kv,
    }
}

pub fn offline_context(backend: Arc<MockBackend>) -> TestContext {
    setup(false, backend, MockProbe::healthy(), test_config())
}
