//! Test doubles for the session engine.
//!
//! Enabled in this crate's tests and, for downstream crates, through the
//! `testing` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::ids::IdGenerator;
use crate::observer::{StoreObserver, StoreOp};
use crate::store::{Batch, BatchOp, Fields, SessionStore};

/// A call received by [`MockStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Exists(String),
    HashGetAll(String),
    HashSet(String, Fields),
    HashDelete(String, Vec<String>),
    Expire(String, Duration),
    ExecBatch(Batch),
}

/// Operation a [`MockStore`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Exists,
    HashGetAll,
    HashSet,
    HashDelete,
    Expire,
    /// Every batch.
    Batch,
    /// Batches containing a hash set; nothing in them is applied.
    BatchWithHashSet,
}

/// Recording [`SessionStore`] with failure injection.
///
/// Keeps plain hashes without expiry. Every call is logged before any
/// failure is injected, so failed calls show up in [`calls`](Self::calls).
#[derive(Debug, Default)]
pub struct MockStore {
    data: Mutex<HashMap<String, Fields>>,
    calls: Mutex<Vec<StoreCall>>,
    fail: Mutex<Vec<FailOn>>,
    always_exists: AtomicBool,
    delay: Option<Duration>,
}

impl MockStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call before touching data.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Insert a hash directly, bypassing the call log.
    pub fn seed(&self, key: &str, fields: Fields) {
        self.data.lock().insert(key.to_string(), fields);
    }

    /// Current contents of a hash.
    pub fn snapshot(&self, key: &str) -> Option<Fields> {
        self.data.lock().get(key).cloned()
    }

    /// Make `exists` report every key as taken.
    pub fn set_always_exists(&self, enabled: bool) {
        self.always_exists.store(enabled, Ordering::SeqCst);
    }

    /// Fail every subsequent call matching `op`.
    pub fn fail_on(&self, op: FailOn) {
        self.fail.lock().push(op);
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Number of calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Key and TTL of every `expire` call.
    pub fn expire_calls(&self) -> Vec<(String, Duration)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                StoreCall::Expire(key, ttl) => Some((key.clone(), *ttl)),
                _ => None,
            })
            .collect()
    }

    async fn enter(&self, call: StoreCall, op: FailOn) -> StoreResult<()> {
        self.calls.lock().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.lock().contains(&op) {
            return Err(StoreError::Connection(format!("injected failure: {:?}", op)));
        }
        Ok(())
    }

    fn apply_delete(data: &mut HashMap<String, Fields>, key: &str, fields: &[String]) -> usize {
        let Some(hash) = data.get_mut(key) else {
            return 0;
        };
        let removed = fields.iter().filter(|f| hash.remove(f.as_str()).is_some()).count();
        if hash.is_empty() {
            data.remove(key);
        }
        removed
    }
}

#[async_trait]
impl SessionStore for MockStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.enter(StoreCall::Exists(key.to_string()), FailOn::Exists)
            .await?;
        Ok(self.always_exists.load(Ordering::SeqCst) || self.data.lock().contains_key(key))
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Fields> {
        self.enter(StoreCall::HashGetAll(key.to_string()), FailOn::HashGetAll)
            .await?;
        Ok(self.data.lock().get(key).cloned().unwrap_or_default())
    }

    async fn hash_set(&self, key: &str, fields: &Fields) -> StoreResult<()> {
        self.enter(
            StoreCall::HashSet(key.to_string(), fields.clone()),
            FailOn::HashSet,
        )
        .await?;
        self.data
            .lock()
            .entry(key.to_string())
            .or_default()
            .extend(fields.clone());
        Ok(())
    }

    async fn hash_delete(&self, key: &str, fields: &[String]) -> StoreResult<usize> {
        self.enter(
            StoreCall::HashDelete(key.to_string(), fields.to_vec()),
            FailOn::HashDelete,
        )
        .await?;
        Ok(Self::apply_delete(&mut self.data.lock(), key, fields))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.enter(StoreCall::Expire(key.to_string(), ttl), FailOn::Expire)
            .await?;
        Ok(self.data.lock().contains_key(key))
    }

    async fn exec_batch(&self, batch: Batch) -> StoreResult<()> {
        self.enter(StoreCall::ExecBatch(batch.clone()), FailOn::Batch)
            .await?;

        let has_set = batch
            .ops()
            .iter()
            .any(|op| matches!(op, BatchOp::HashSet { .. }));
        if has_set && self.fail.lock().contains(&FailOn::BatchWithHashSet) {
            return Err(StoreError::Aborted("injected failure: hset in batch".to_string()));
        }

        let mut data = self.data.lock();
        for op in batch.into_ops() {
            match op {
                BatchOp::HashDelete { key, fields } => {
                    Self::apply_delete(&mut data, &key, &fields);
                }
                BatchOp::HashSet { key, fields } => {
                    data.entry(key).or_default().extend(fields);
                }
            }
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

/// Deterministic [`IdGenerator`] cycling through a fixed list.
#[derive(Debug, Default)]
pub struct SequenceIds {
    ids: Vec<u64>,
    next: AtomicUsize,
}

impl SequenceIds {
    /// Create a generator yielding `ids` in order, wrapping around. An empty list yields 0.
    pub fn new(ids: Vec<u64>) -> Self {
        Self {
            ids,
            next: AtomicUsize::new(0),
        }
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> u64 {
        if self.ids.is_empty() {
            return 0;
        }
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        self.ids[i % self.ids.len()]
    }
}

/// Observer that records what it is told.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    failures: Mutex<Vec<(StoreOp, String, StoreError)>>,
    ttl_failures: Mutex<Vec<String>>,
    ttl_missing: Mutex<Vec<String>>,
}

impl RecordingObserver {
    /// Store failures, in order.
    pub fn failures(&self) -> Vec<(StoreOp, String, StoreError)> {
        self.failures.lock().clone()
    }

    /// Keys whose TTL refresh failed.
    pub fn ttl_failures(&self) -> Vec<String> {
        self.ttl_failures.lock().clone()
    }

    /// Keys reported missing at TTL refresh.
    pub fn ttl_missing_keys(&self) -> Vec<String> {
        self.ttl_missing.lock().clone()
    }
}

impl StoreObserver for RecordingObserver {
    fn store_failed(&self, op: StoreOp, key: &str, err: &StoreError) {
        self.failures.lock().push((op, key.to_string(), err.clone()));
    }

    fn ttl_refresh_failed(&self, key: &str, _err: &StoreError) {
        self.ttl_failures.lock().push(key.to_string());
    }

    fn ttl_missing(&self, key: &str) {
        self.ttl_missing.lock().push(key.to_string());
    }
}
