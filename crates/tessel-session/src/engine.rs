//! Session allocation and mutation engine.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::config::{EngineConfig, UpdateMode};
use crate::error::{Error, Result};
use crate::ids::{IdGenerator, RandomIds};
use crate::observer::{SharedObserver, StoreOp, TracingObserver};
use crate::store::{Fields, SharedStore, StoreStats};
use crate::strategy::{FieldUpdate, UpdateStrategy, strategy_for};

/// Field written at allocation so the key exists before any caller data.
///
/// Never returned to callers and never changed by caller updates.
pub const CREATION_TIME_FIELD: &str = "sessionCreationTime";

/// Identifier of a session. Its decimal form is the store key.
pub type SessionId = u64;

fn session_key(id: SessionId) -> String {
    id.to_string()
}

/// Allocates, reads and updates sessions held in a [`SessionStore`](crate::SessionStore).
///
/// Every successful operation resets the session's expiry to the full
/// configured timeout. Store failures are reported to the observer and
/// surface as [`Error::Internal`].
///
/// Allocation is serialized by an in-process lock so two concurrent
/// callers cannot both claim the same free id. This bounds allocation
/// throughput and only protects a single process. Reads and updates never
/// take the lock.
pub struct SessionEngine {
    store: SharedStore,
    config: EngineConfig,
    updater: Box<dyn UpdateStrategy>,
    observer: SharedObserver,
    ids: Box<dyn IdGenerator>,
    generate_lock: Mutex<()>,
}

impl SessionEngine {
    /// Create an engine over `store`, logging failures through `tracing`.
    pub fn new(store: SharedStore, config: EngineConfig) -> Self {
        let updater = strategy_for(config.update_mode);
        Self {
            store,
            config,
            updater,
            observer: Arc::new(TracingObserver),
            ids: Box::new(RandomIds),
            generate_lock: Mutex::new(()),
        }
    }

    /// Replace the failure observer.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the id source.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Update strategy in use.
    pub fn update_mode(&self) -> UpdateMode {
        self.updater.mode()
    }

    /// Name of the backing store.
    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    /// In-process store statistics, if the backend keeps any.
    pub async fn store_stats(&self) -> Option<StoreStats> {
        self.store.stats().await
    }

    /// Allocate a new session and return its id.
    ///
    /// `_hint` is accepted for interface compatibility and ignored.
    pub async fn generate(&self, _hint: &Fields) -> Result<SessionId> {
        let _guard = self.generate_lock.lock().await;

        for attempt in 1..=self.config.retry_number {
            let id = self.ids.next_id();
            let key = session_key(id);

            let taken = self.store.exists(&key).await.map_err(|e| {
                self.observer.store_failed(StoreOp::Exists, &key, &e);
                Error::Internal
            })?;
            if taken {
                debug!(session_id = id, attempt, "Session id collision, retrying");
                continue;
            }

            let mut marker = Fields::new();
            marker.insert(CREATION_TIME_FIELD.to_string(), Utc::now().to_rfc3339());
            self.store.hash_set(&key, &marker).await.map_err(|e| {
                self.observer.store_failed(StoreOp::HashSet, &key, &e);
                Error::Internal
            })?;

            self.touch(&key).await;
            debug!(session_id = id, attempt, "Session allocated");
            return Ok(id);
        }

        Err(Error::RetriesExhausted {
            attempts: self.config.retry_number,
        })
    }

    /// Read a session's fields.
    ///
    /// An unknown or expired session yields an empty map, not an error.
    pub async fn get_session_info(&self, id: SessionId) -> Result<Fields> {
        let key = session_key(id);

        let mut fields = self.store.hash_get_all(&key).await.map_err(|e| {
            self.observer.store_failed(StoreOp::HashGetAll, &key, &e);
            Error::Internal
        })?;

        if fields.is_empty() {
            trace!(session_id = id, "Session not found");
            return Ok(fields);
        }

        self.touch(&key).await;
        fields.remove(CREATION_TIME_FIELD);
        Ok(fields)
    }

    /// Apply caller updates: an empty value deletes the field, any other sets it.
    pub async fn update_session_info(&self, id: SessionId, fields: Fields) -> Result<()> {
        let key = session_key(id);
        let update = FieldUpdate::from_request(fields);

        self.updater
            .apply(self.store.as_ref(), &key, &update)
            .await
            .map_err(|e| {
                self.observer.store_failed(StoreOp::Update, &key, &e);
                Error::Internal
            })?;

        trace!(
            session_id = id,
            deleted = update.deletes.len(),
            upserted = update.upserts.len(),
            mode = self.updater.mode().as_str(),
            "Session updated"
        );

        self.touch(&key).await;
        Ok(())
    }

    /// Reset the key's expiry. Failures are reported, never returned.
    async fn touch(&self, key: &str) {
        match self.store.expire(key, self.config.session_timeout).await {
            Ok(true) => {}
            Ok(false) => self.observer.ttl_missing(key),
            Err(e) => self.observer.ttl_refresh_failed(key, &e),
        }
    }
}
