//! Strategies for applying caller updates to a session hash.

use async_trait::async_trait;

use crate::config::UpdateMode;
use crate::engine::CREATION_TIME_FIELD;
use crate::error::StoreResult;
use crate::store::{Batch, Fields, SessionStore};

/// A caller update split into deletions and upserts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdate {
    /// Field names to remove, sorted.
    pub deletes: Vec<String>,

    /// Fields to set.
    pub upserts: Fields,
}

impl FieldUpdate {
    /// Split a caller map: an empty value deletes the field, anything else sets it.
    ///
    /// The creation-time field is dropped whatever its value.
    pub fn from_request(fields: Fields) -> Self {
        let mut update = Self::default();
        for (name, value) in fields {
            if name == CREATION_TIME_FIELD {
                continue;
            }
            if value.is_empty() {
                update.deletes.push(name);
            } else {
                update.upserts.insert(name, value);
            }
        }
        update.deletes.sort();
        update
    }

    /// Check if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.upserts.is_empty()
    }
}

/// Applies a [`FieldUpdate`] to one key.
#[async_trait]
pub trait UpdateStrategy: Send + Sync {
    /// Mode this strategy implements.
    fn mode(&self) -> UpdateMode;

    /// Apply the update. An empty update must issue no store calls.
    async fn apply(
        &self,
        store: &dyn SessionStore,
        key: &str,
        update: &FieldUpdate,
    ) -> StoreResult<()>;
}

/// Queues deletions and upserts into a single atomic batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionalUpdate;

#[async_trait]
impl UpdateStrategy for TransactionalUpdate {
    fn mode(&self) -> UpdateMode {
        UpdateMode::Transactional
    }

    async fn apply(
        &self,
        store: &dyn SessionStore,
        key: &str,
        update: &FieldUpdate,
    ) -> StoreResult<()> {
        let mut batch = Batch::new();
        if !update.deletes.is_empty() {
            batch = batch.hash_delete(key, update.deletes.clone());
        }
        if !update.upserts.is_empty() {
            batch = batch.hash_set(key, update.upserts.clone());
        }
        if batch.is_empty() {
            return Ok(());
        }
        store.exec_batch(batch).await
    }
}

/// Applies deletions, then upserts, as independent calls.
///
/// A failure on the upsert leaves the deletions in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialUpdate;

#[async_trait]
impl UpdateStrategy for SequentialUpdate {
    fn mode(&self) -> UpdateMode {
        UpdateMode::Sequential
    }

    async fn apply(
        &self,
        store: &dyn SessionStore,
        key: &str,
        update: &FieldUpdate,
    ) -> StoreResult<()> {
        if !update.deletes.is_empty() {
            store.hash_delete(key, &update.deletes).await?;
        }
        if !update.upserts.is_empty() {
            store.hash_set(key, &update.upserts).await?;
        }
        Ok(())
    }
}

/// Build the strategy for a mode.
pub fn strategy_for(mode: UpdateMode) -> Box<dyn UpdateStrategy> {
    match mode {
        UpdateMode::Transactional => Box::new(TransactionalUpdate),
        UpdateMode::Sequential => Box::new(SequentialUpdate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use crate::testing::{MockStore, StoreCall};

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_split_request() {
        let update = FieldUpdate::from_request(fields(&[
            ("score", "10"),
            ("lives", ""),
            ("badge", ""),
        ]));

        assert_eq!(update.deletes, vec!["badge".to_string(), "lives".to_string()]);
        assert_eq!(update.upserts, fields(&[("score", "10")]));
    }

    #[test]
    fn test_creation_time_filtered() {
        let update = FieldUpdate::from_request(fields(&[(CREATION_TIME_FIELD, "")]));
        assert!(update.is_empty());

        let update = FieldUpdate::from_request(fields(&[(CREATION_TIME_FIELD, "forged")]));
        assert!(update.is_empty());
    }

    #[test]
    fn test_strategy_for_mode() {
        assert_eq!(
            strategy_for(UpdateMode::Transactional).mode(),
            UpdateMode::Transactional
        );
        assert_eq!(
            strategy_for(UpdateMode::Sequential).mode(),
            UpdateMode::Sequential
        );
    }

    #[tokio::test]
    async fn test_transactional_issues_one_batch() {
        let store = MockStore::new();
        let update = FieldUpdate::from_request(fields(&[("score", "10"), ("lives", "")]));

        TransactionalUpdate.apply(&store, "7", &update).await.unwrap();

        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        let StoreCall::ExecBatch(batch) = &calls[0] else {
            panic!("expected a batch, got {:?}", calls[0]);
        };
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ops()[0].name(), "hdel");
        assert_eq!(batch.ops()[1].name(), "hset");
    }

    #[tokio::test]
    async fn test_transactional_only_queues_non_empty_ops() {
        let store = MockStore::new();
        let update = FieldUpdate::from_request(fields(&[("score", "10")]));

        TransactionalUpdate.apply(&store, "7", &update).await.unwrap();

        let StoreCall::ExecBatch(batch) = &store.calls()[0] else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.ops()[0].name(), "hset");
    }

    #[tokio::test]
    async fn test_empty_update_issues_nothing() {
        let store = MockStore::new();
        let update = FieldUpdate::default();

        TransactionalUpdate.apply(&store, "7", &update).await.unwrap();
        SequentialUpdate.apply(&store, "7", &update).await.unwrap();

        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sequential_deletes_then_sets() {
        let store = MemoryStore::default();
        store
            .hash_set("7", &fields(&[("lives", "3"), ("name", "ann")]))
            .await
            .unwrap();

        let update = FieldUpdate::from_request(fields(&[("score", "10"), ("lives", "")]));
        SequentialUpdate.apply(&store, "7", &update).await.unwrap();

        assert_eq!(
            store.hash_get_all("7").await.unwrap(),
            fields(&[("name", "ann"), ("score", "10")])
        );
    }
}
