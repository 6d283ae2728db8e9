//! In-memory hash store with a key limit and per-key expiry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::config::MemoryStoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{Batch, BatchOp, Fields, SessionStore, StoreStats};
use crate::ttl::TtlTracker;

/// Inner state protected by RwLock.
struct StoreInner {
    /// Key to hash.
    hashes: HashMap<String, Fields>,

    /// Expiry deadlines.
    ttl: TtlTracker,

    /// Key limit, if any.
    max_keys: Option<usize>,
}

impl StoreInner {
    /// Drop the key if its deadline has passed.
    fn purge_if_expired(&mut self, key: &str) {
        if self.ttl.is_expired(key) {
            self.ttl.remove(key);
            if self.hashes.remove(key).is_some() {
                trace!(key = %key, "Key expired, removed on access");
            }
        }
    }

    /// Remove every expired key. Returns how many were removed.
    fn sweep_expired(&mut self) -> usize {
        self.ttl
            .drain_expired()
            .into_iter()
            .filter(|key| self.hashes.remove(key).is_some())
            .count()
    }

    /// Check that `new_keys` more keys fit, sweeping expired keys if needed.
    ///
    /// Live keys are never evicted: a full store refuses the write.
    fn reserve(&mut self, new_keys: usize) -> StoreResult<()> {
        let Some(max) = self.max_keys else {
            return Ok(());
        };
        if self.hashes.len() + new_keys <= max {
            return Ok(());
        }

        let swept = self.sweep_expired();
        if swept > 0 {
            debug!(count = swept, "Swept expired keys to make room");
        }

        if self.hashes.len() + new_keys > max {
            warn!(max_keys = max, "Key limit reached, refusing write");
            return Err(StoreError::Command(format!(
                "OOM key limit of {} reached",
                max
            )));
        }
        Ok(())
    }

    fn hash_set(&mut self, key: &str, fields: &Fields) -> StoreResult<()> {
        self.purge_if_expired(key);
        if !self.hashes.contains_key(key) {
            self.reserve(1)?;
        }
        self.insert_fields(key, fields);
        Ok(())
    }

    /// Merge fields into the hash. Capacity must already be reserved.
    fn insert_fields(&mut self, key: &str, fields: &Fields) {
        let hash = self.hashes.entry(key.to_string()).or_default();
        for (name, value) in fields {
            hash.insert(name.clone(), value.clone());
        }
    }

    fn hash_delete(&mut self, key: &str, fields: &[String]) -> usize {
        self.purge_if_expired(key);

        let Some(hash) = self.hashes.get_mut(key) else {
            return 0;
        };
        let removed = fields
            .iter()
            .filter(|name| hash.remove(name.as_str()).is_some())
            .count();

        if hash.is_empty() {
            self.hashes.remove(key);
            self.ttl.remove(key);
            trace!(key = %key, "Last field deleted, key removed");
        }

        removed
    }
}

/// Reject operations a real store would refuse, before anything is applied.
fn validate(op: &BatchOp) -> StoreResult<()> {
    let empty = match op {
        BatchOp::HashDelete { fields, .. } => fields.is_empty(),
        BatchOp::HashSet { fields, .. } => fields.is_empty(),
    };
    if empty {
        return Err(StoreError::Command(format!(
            "wrong number of arguments for '{}' command",
            op.name()
        )));
    }
    Ok(())
}

/// In-process [`SessionStore`] with a key limit and expiry.
///
/// This store provides:
/// - A key limit: when full, expired keys are swept and, failing that,
///   writes creating new keys are refused (live keys are never evicted)
/// - Per-key expiry, checked on access and swept by an optional task
/// - Atomic batches: every op is validated, then all are applied under one lock
///
/// Clones share the same underlying data.
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
    config: MemoryStoreConfig,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new(config: MemoryStoreConfig) -> Self {
        let inner = StoreInner {
            hashes: HashMap::new(),
            ttl: TtlTracker::new(),
            max_keys: (config.max_keys > 0).then_some(config.max_keys),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }

    /// Get the current number of keys, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.read().await.hashes.len()
    }

    /// Check if the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.hashes.is_empty()
    }

    /// Remaining time before the key expires, if it has an expiry.
    pub async fn time_to_live(&self, key: &str) -> Option<Duration> {
        let inner = self.inner.read().await;
        if inner.hashes.contains_key(key) {
            inner.ttl.remaining(key)
        } else {
            None
        }
    }

    /// Remove every expired key. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let count = self.inner.write().await.sweep_expired();

        if count > 0 {
            debug!(count = count, "Cleaned up expired keys");
        }

        count
    }

    /// Start the background sweeper if enabled.
    ///
    /// Must be called from within a tokio runtime. The task runs until
    /// the returned handle is aborted or the runtime shuts down.
    pub fn spawn_cleanup(&self) -> Option<JoinHandle<()>> {
        if !self.config.enable_cleanup_task {
            return None;
        }
        let interval = self.config.cleanup_interval;
        if interval.is_zero() {
            warn!("Cleanup interval is zero, expired keys are only removed on access");
            return None;
        }

        let store = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.cleanup_expired().await;
            }
        }))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);
        Ok(inner.hashes.contains_key(key))
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Fields> {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);
        Ok(inner.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_set(&self, key: &str, fields: &Fields) -> StoreResult<()> {
        if fields.is_empty() {
            return Err(StoreError::Command(
                "wrong number of arguments for 'hset' command".to_string(),
            ));
        }
        self.inner.write().await.hash_set(key, fields)
    }

    async fn hash_delete(&self, key: &str, fields: &[String]) -> StoreResult<usize> {
        if fields.is_empty() {
            return Err(StoreError::Command(
                "wrong number of arguments for 'hdel' command".to_string(),
            ));
        }
        Ok(self.inner.write().await.hash_delete(key, fields))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);
        if !inner.hashes.contains_key(key) {
            return Ok(false);
        }
        inner.ttl.expire(key, ttl);
        Ok(true)
    }

    async fn exec_batch(&self, batch: Batch) -> StoreResult<()> {
        for op in batch.ops() {
            validate(op).map_err(|e| StoreError::Aborted(e.to_string()))?;
        }

        let mut inner = self.inner.write().await;

        let mut created = HashSet::new();
        for op in batch.ops() {
            if let BatchOp::HashSet { key, .. } = op {
                inner.purge_if_expired(key);
                if !inner.hashes.contains_key(key) {
                    created.insert(key.as_str());
                }
            }
        }
        inner
            .reserve(created.len())
            .map_err(|e| StoreError::Aborted(e.to_string()))?;
        drop(created);

        for op in batch.into_ops() {
            match op {
                BatchOp::HashDelete { key, fields } => {
                    inner.hash_delete(&key, &fields);
                }
                BatchOp::HashSet { key, fields } => inner.insert_fields(&key, &fields),
            }
        }

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn stats(&self) -> Option<StoreStats> {
        let inner = self.inner.read().await;
        Some(StoreStats {
            size: inner.hashes.len(),
            capacity: inner.max_keys,
            ttl_tracked: inner.ttl.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::default();
        assert!(store.is_empty().await);

        store.hash_set("1", &fields(&[("a", "x")])).await.unwrap();
        store.hash_set("1", &fields(&[("b", "y")])).await.unwrap();

        let all = store.hash_get_all("1").await.unwrap();
        assert_eq!(all, fields(&[("a", "x"), ("b", "y")]));
        assert!(store.exists("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_key_reads_empty() {
        let store = MemoryStore::default();

        assert!(store.hash_get_all("nope").await.unwrap().is_empty());
        assert!(!store.exists("nope").await.unwrap());
        assert!(!store.expire("nope", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_commands_rejected() {
        let store = MemoryStore::default();

        let err = store.hash_set("1", &Fields::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Command(_)));

        let err = store.hash_delete("1", &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Command(_)));
    }

    #[tokio::test]
    async fn test_deleting_last_field_removes_key() {
        let store = MemoryStore::default();
        store
            .hash_set("1", &fields(&[("a", "x"), ("b", "y")]))
            .await
            .unwrap();
        store.expire("1", Duration::from_secs(60)).await.unwrap();

        let removed = store
            .hash_delete("1", &["a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.exists("1").await.unwrap());

        store.hash_delete("1", &["b".to_string()]).await.unwrap();
        assert!(!store.exists("1").await.unwrap());
        assert_eq!(store.stats().await.unwrap().ttl_tracked, 0);
    }

    #[tokio::test]
    async fn test_full_store_refuses_new_keys() {
        let store = MemoryStore::new(MemoryStoreConfig::new().with_max_keys(2));
        store.hash_set("1", &fields(&[("f", "v")])).await.unwrap();
        store.hash_set("2", &fields(&[("f", "v")])).await.unwrap();

        let err = store.hash_set("3", &fields(&[("f", "v")])).await.unwrap_err();
        assert!(matches!(err, StoreError::Command(ref msg) if msg.starts_with("OOM")));

        // Existing keys are untouched and still writable
        assert_eq!(store.len().await, 2);
        assert_eq!(store.hash_get_all("1").await.unwrap(), fields(&[("f", "v")]));
        store.hash_set("2", &fields(&[("g", "w")])).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_store_sweeps_expired_before_refusing() {
        let store = MemoryStore::new(
            MemoryStoreConfig::new()
                .with_max_keys(2)
                .with_cleanup_task(false),
        );
        store.hash_set("old", &fields(&[("f", "v")])).await.unwrap();
        store.expire("old", Duration::from_millis(10)).await.unwrap();
        store.hash_set("live", &fields(&[("f", "v")])).await.unwrap();

        sleep(Duration::from_millis(30)).await;

        store.hash_set("new", &fields(&[("f", "v")])).await.unwrap();

        assert!(store.exists("live").await.unwrap());
        assert!(store.exists("new").await.unwrap());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_zero_max_keys_is_unbounded() {
        let store = MemoryStore::new(MemoryStoreConfig::new().with_max_keys(0));
        for i in 0..50 {
            store
                .hash_set(&i.to_string(), &fields(&[("f", "v")]))
                .await
                .unwrap();
        }
        assert_eq!(store.len().await, 50);
        assert_eq!(store.stats().await.unwrap().capacity, None);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = MemoryStore::default();
        store.hash_set("1", &fields(&[("f", "v")])).await.unwrap();
        assert!(store.expire("1", Duration::from_millis(50)).await.unwrap());

        assert!(store.exists("1").await.unwrap());

        sleep(Duration::from_millis(100)).await;

        assert!(!store.exists("1").await.unwrap());
        assert!(store.hash_get_all("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expire_resets_ttl() {
        let store = MemoryStore::default();
        store.hash_set("1", &fields(&[("f", "v")])).await.unwrap();
        store.expire("1", Duration::from_millis(100)).await.unwrap();

        sleep(Duration::from_millis(60)).await;

        store.expire("1", Duration::from_millis(100)).await.unwrap();

        // Past the first deadline, inside the second
        sleep(Duration::from_millis(60)).await;

        assert!(store.exists("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_huge_ttl_keeps_key() {
        let store = MemoryStore::default();
        store.hash_set("1", &fields(&[("f", "v")])).await.unwrap();

        assert!(store.expire("1", Duration::MAX).await.unwrap());

        assert!(store.exists("1").await.unwrap());
        assert_eq!(store.time_to_live("1").await, None);
    }

    #[tokio::test]
    async fn test_hash_set_keeps_expiry() {
        let store = MemoryStore::default();
        store.hash_set("1", &fields(&[("f", "v")])).await.unwrap();
        store.expire("1", Duration::from_secs(60)).await.unwrap();

        store.hash_set("1", &fields(&[("g", "w")])).await.unwrap();

        let remaining = store.time_to_live("1").await.unwrap();
        assert!(remaining > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = MemoryStore::default();

        for i in 1..=3 {
            let key = i.to_string();
            store.hash_set(&key, &fields(&[("f", "v")])).await.unwrap();
            store.expire(&key, Duration::from_millis(50)).await.unwrap();
        }
        store.hash_set("keep", &fields(&[("f", "v")])).await.unwrap();

        assert_eq!(store.len().await, 4);

        sleep(Duration::from_millis(100)).await;

        let cleaned = store.cleanup_expired().await;
        assert_eq!(cleaned, 3);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_task_sweeps() {
        let store = MemoryStore::new(
            MemoryStoreConfig::new().with_cleanup_interval(Duration::from_millis(20)),
        );
        store.hash_set("1", &fields(&[("f", "v")])).await.unwrap();
        store.expire("1", Duration::from_millis(10)).await.unwrap();

        let handle = store.spawn_cleanup().unwrap();
        sleep(Duration::from_millis(100)).await;
        handle.abort();

        // Swept without any access to the key
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_task_disabled() {
        let store = MemoryStore::new(MemoryStoreConfig::new().with_cleanup_task(false));
        assert!(store.spawn_cleanup().is_none());
    }

    #[tokio::test]
    async fn test_batch_applies_all() {
        let store = MemoryStore::default();
        store
            .hash_set("1", &fields(&[("lives", "3"), ("name", "bob")]))
            .await
            .unwrap();

        let batch = Batch::new()
            .hash_delete("1", vec!["lives".to_string()])
            .hash_set("1", fields(&[("score", "10")]));
        store.exec_batch(batch).await.unwrap();

        let all = store.hash_get_all("1").await.unwrap();
        assert_eq!(all, fields(&[("name", "bob"), ("score", "10")]));
    }

    #[tokio::test]
    async fn test_invalid_batch_applies_nothing() {
        let store = MemoryStore::default();
        store.hash_set("1", &fields(&[("lives", "3")])).await.unwrap();

        let batch = Batch::new()
            .hash_delete("1", vec!["lives".to_string()])
            .hash_set("1", Fields::new());
        let err = store.exec_batch(batch).await.unwrap_err();

        assert!(matches!(err, StoreError::Aborted(_)));
        assert_eq!(
            store.hash_get_all("1").await.unwrap(),
            fields(&[("lives", "3")])
        );
    }

    #[tokio::test]
    async fn test_batch_over_key_limit_applies_nothing() {
        let store = MemoryStore::new(MemoryStoreConfig::new().with_max_keys(1));
        store.hash_set("1", &fields(&[("lives", "3")])).await.unwrap();

        let batch = Batch::new()
            .hash_delete("1", vec!["lives".to_string()])
            .hash_set("2", fields(&[("score", "10")]));
        let err = store.exec_batch(batch).await.unwrap_err();

        assert!(matches!(err, StoreError::Aborted(_)));
        assert_eq!(
            store.hash_get_all("1").await.unwrap(),
            fields(&[("lives", "3")])
        );
        assert!(!store.exists("2").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryStore::new(MemoryStoreConfig::new().with_max_keys(100));

        for i in 1..=5 {
            let key = i.to_string();
            store.hash_set(&key, &fields(&[("f", "v")])).await.unwrap();
            if i % 2 == 0 {
                store.expire(&key, Duration::from_secs(60)).await.unwrap();
            }
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.size, 5);
        assert_eq!(stats.capacity, Some(100));
        assert_eq!(stats.ttl_tracked, 2);
        assert_eq!(store.backend(), "memory");
    }
}
