//! Session allocation engine with sliding expiration.
//!
//! This crate provides short-lived sessions identified by a random `u64`,
//! each backed by a string hash in a key/value store:
//! - Collision-safe id allocation under concurrent callers
//! - Sliding expiration: every successful access resets the TTL
//! - Atomic multi-field updates, or sequential ones for debugging
//! - An in-memory store with a key limit and expiry sweeping
//! - A Redis store for networked deployments
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessel_session::{EngineConfig, MemoryStore, SessionEngine};
//!
//! let store = Arc::new(MemoryStore::default());
//! let engine = SessionEngine::new(store, EngineConfig::new().with_retry_number(5));
//!
//! let id = engine.generate(&Default::default()).await?;
//! engine.update_session_info(id, [("score".into(), "10".into())].into()).await?;
//! ```

pub mod config;
mod engine;
mod error;
mod ids;
mod memory;
mod observer;
mod redis_store;
mod store;
mod strategy;
mod ttl;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{EngineConfig, MemoryStoreConfig, RedisStoreConfig, UpdateMode};
pub use engine::{CREATION_TIME_FIELD, SessionEngine, SessionId};
pub use error::{Error, Result, StoreError, StoreResult};
pub use ids::{IdGenerator, RandomIds};
pub use memory::MemoryStore;
pub use observer::{SharedObserver, StoreObserver, StoreOp, TracingObserver};
pub use redis_store::RedisStore;
pub use store::{Batch, BatchOp, Fields, SessionStore, SharedStore, StoreStats};
pub use strategy::{
    FieldUpdate, SequentialUpdate, TransactionalUpdate, UpdateStrategy, strategy_for,
};
pub use ttl::TtlTracker;
