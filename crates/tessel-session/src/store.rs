//! Backing store contract.
//!
//! The engine is decoupled from the concrete key/value store through the
//! [`SessionStore`] trait. The contract mirrors a Redis-style hash store:
//!
//! - `HSET` creates the key if needed and keeps any existing expiry
//! - deleting the last field of a hash removes the key
//! - a key without an expiry never expires
//! - `HSET`/`HDEL` with no fields is a command error
//!
//! [`MemoryStore`](crate::MemoryStore) is the in-process implementation and
//! [`RedisStore`](crate::RedisStore) talks to a Redis server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Field name to field value.
pub type Fields = HashMap<String, String>;

/// A single operation inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Remove fields from a hash.
    HashDelete { key: String, fields: Vec<String> },

    /// Set fields on a hash.
    HashSet { key: String, fields: Fields },
}

impl BatchOp {
    /// Command name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HashDelete { .. } => "hdel",
            Self::HashSet { .. } => "hset",
        }
    }
}

/// Operations executed together with all-or-nothing visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a field deletion.
    pub fn hash_delete(mut self, key: impl Into<String>, fields: Vec<String>) -> Self {
        self.ops.push(BatchOp::HashDelete {
            key: key.into(),
            fields,
        });
        self
    }

    /// Queue a field upsert.
    pub fn hash_set(mut self, key: impl Into<String>, fields: Fields) -> Self {
        self.ops.push(BatchOp::HashSet {
            key: key.into(),
            fields,
        });
        self
    }

    /// Queued operations, in order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume the batch, yielding its operations.
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Key/value store holding session hashes.
///
/// Implementations must be safe to call concurrently. Timeouts and
/// cancellation belong to the implementation; they surface as
/// [`StoreError`](crate::StoreError) values.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Check whether the key exists.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Read every field of the hash. A missing key yields an empty map.
    async fn hash_get_all(&self, key: &str) -> StoreResult<Fields>;

    /// Set fields on the hash, creating the key if needed.
    async fn hash_set(&self, key: &str, fields: &Fields) -> StoreResult<()>;

    /// Remove fields from the hash. Returns how many were present.
    async fn hash_delete(&self, key: &str, fields: &[String]) -> StoreResult<usize>;

    /// Set the key to expire after `ttl`. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Execute a batch atomically: either every operation applies or none do.
    async fn exec_batch(&self, batch: Batch) -> StoreResult<()>;

    /// Short backend name, as reported by health checks.
    fn backend(&self) -> &'static str;

    /// Statistics kept in process. Networked backends report none.
    async fn stats(&self) -> Option<StoreStats> {
        None
    }
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Current number of keys, including expired ones not yet swept.
    pub size: usize,

    /// Maximum number of keys, if bounded.
    pub capacity: Option<usize>,

    /// Number of keys carrying an expiry.
    pub ttl_tracked: usize,
}

/// Thread-safe shared store handle.
pub type SharedStore = Arc<dyn SessionStore>;
