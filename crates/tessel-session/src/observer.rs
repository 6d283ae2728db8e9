//! Observer for store failures.
//!
//! The engine never returns store errors to callers. It reports them here
//! so the core stays testable with a fake store and a recording observer.

use std::sync::Arc;

use tracing::{error, warn};

use crate::error::StoreError;

/// Store operation that failed, as reported to a [`StoreObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Exists,
    HashGetAll,
    HashSet,
    Update,
}

impl StoreOp {
    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::HashGetAll => "hgetall",
            Self::HashSet => "hset",
            Self::Update => "update",
        }
    }
}

/// Receives store failures the engine swallowed.
pub trait StoreObserver: Send + Sync {
    /// A store call failed and the operation returned an internal error.
    fn store_failed(&self, op: StoreOp, key: &str, err: &StoreError);

    /// Refreshing a key's expiry failed after the operation succeeded.
    fn ttl_refresh_failed(&self, key: &str, err: &StoreError);

    /// The expiry call reported the key missing (expired or evicted in between).
    fn ttl_missing(&self, _key: &str) {}
}

/// Thread-safe shared observer handle.
pub type SharedObserver = Arc<dyn StoreObserver>;

/// Observer that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StoreObserver for TracingObserver {
    fn store_failed(&self, op: StoreOp, key: &str, err: &StoreError) {
        error!(op = op.as_str(), key = %key, error = %err, "Failed during store call");
    }

    fn ttl_refresh_failed(&self, key: &str, err: &StoreError) {
        warn!(key = %key, error = %err, "Failed to set TTL");
    }

    fn ttl_missing(&self, key: &str) {
        warn!(key = %key, "Key vanished before TTL refresh");
    }
}
