//! Shared fixtures: a scriptable backend over the in-memory one.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mission_objects::persistence::PersistedRecord;
use mission_objects::{BackendError, InMemoryPersistence, Model, PersistenceService};
use serde_json::Value;

struct Script {
    failing_listings: Mutex<HashSet<String>>,
    failing_reads: Mutex<HashSet<String>>,
    fail_writes: AtomicBool,
    stall_writes: AtomicBool,
    writes: AtomicUsize,
}

/// In-memory backend whose failures can be switched on per space.
///
/// Clones share storage and script, so a test can keep a handle after
/// passing the backend to a platform.
#[derive(Clone)]
pub struct ScriptedBackend {
    inner: InMemoryPersistence,
    script: Arc<Script>,
}

impl ScriptedBackend {
    pub fn new(spaces: &[&str]) -> Self {
        ScriptedBackend {
            inner: InMemoryPersistence::new(spaces.iter().copied()),
            script: Arc::new(Script {
                failing_listings: Mutex::new(HashSet::new()),
                failing_reads: Mutex::new(HashSet::new()),
                fail_writes: AtomicBool::new(false),
                stall_writes: AtomicBool::new(false),
                writes: AtomicUsize::new(0),
            }),
        }
    }

    pub fn storage(&self) -> &InMemoryPersistence {
        &self.inner
    }

    pub fn fail_listing(&self, space: &str) {
        self.script.failing_listings.lock().unwrap().insert(space.to_string());
    }

    pub fn fail_reads(&self, space: &str) {
        self.script.failing_reads.lock().unwrap().insert(space.to_string());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.script.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stall_writes(&self, stall: bool) {
        self.script.stall_writes.store(stall, Ordering::SeqCst);
    }

    /// Creates and updates that reached storage.
    pub fn writes(&self) -> usize {
        self.script.writes.load(Ordering::SeqCst)
    }

    /// Store `value` directly, bypassing the write counter.
    pub async fn seed(&self, space: &str, id: &str, value: Value) {
        assert!(self
            .inner
            .create_object(space, id, &Model::from_value(value))
            .await
            .unwrap());
    }

    pub async fn stored(&self, space: &str, id: &str) -> Option<Model> {
        self.inner.read_object(space, id).await.unwrap()
    }

    fn unreachable(space: &str) -> BackendError {
        BackendError::Unreachable {
            space: space.to_string(),
            message: "scripted failure".into(),
        }
    }

    async fn before_write(&self, space: &str) -> Result<(), BackendError> {
        if self.script.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.script.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unreachable(space));
        }
        self.script.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn check_read(&self, space: &str) -> Result<(), BackendError> {
        if self.script.failing_reads.lock().unwrap().contains(space) {
            return Err(Self::unreachable(space));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceService for ScriptedBackend {
    async fn list_spaces(&self) -> Result<Vec<String>, BackendError> {
        self.inner.list_spaces().await
    }

    async fn list_objects(&self, space: &str) -> Result<Option<Vec<String>>, BackendError> {
        if self.script.failing_listings.lock().unwrap().contains(space) {
            return Err(Self::unreachable(space));
        }
        self.inner.list_objects(space).await
    }

    async fn create_object(&self, space: &str, id: &str, model: &Model) -> Result<bool, BackendError> {
        self.before_write(space).await?;
        self.inner.create_object(space, id, model).await
    }

    async fn read_object(&self, space: &str, id: &str) -> Result<Option<Model>, BackendError> {
        self.check_read(space)?;
        self.inner.read_object(space, id).await
    }

    async fn update_object(&self, space: &str, id: &str, model: &Model) -> Result<bool, BackendError> {
        self.before_write(space).await?;
        self.inner.update_object(space, id, model).await
    }

    async fn delete_object(&self, space: &str, id: &str) -> Result<bool, BackendError> {
        self.inner.delete_object(space, id).await
    }

    async fn read_record(&self, space: &str, id: &str) -> Result<Option<PersistedRecord>, BackendError> {
        self.check_read(space)?;
        self.inner.read_record(space, id).await
    }
}
