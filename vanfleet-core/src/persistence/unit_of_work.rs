//! Request-scoped unit of work.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{Change, Entity, Store};
use crate::cancellation::Cancellation;
use crate::error::{Error, Result};

/// Stages changes for one request and commits them in a single batch.
///
/// Reads see the committed rows overlaid with everything this unit of work
/// has staged, so a handler reads its own writes before saving. A unit of
/// work is never shared between requests.
pub struct UnitOfWork {
    store: Arc<dyn Store>,
    pending: Vec<Change>,
    transaction: Option<Vec<Change>>,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            pending: Vec::new(),
            transaction: None,
        }
    }

    /// Load one entity by id.
    pub async fn get_by_id<T: Entity>(&self, id: Uuid) -> Result<Option<T>> {
        let mut row = self.store.load(T::KIND, id).await?;
        for change in self.staged().filter(|c| c.kind() == T::KIND && c.id() == id) {
            row = change.row().cloned();
        }
        row.map(decode).transpose()
    }

    /// Load one entity by id, failing with `NotFound` when it is missing.
    pub async fn require<T: Entity>(&self, id: Uuid) -> Result<T> {
        self.get_by_id::<T>(id)
            .await?
            .ok_or_else(|| Error::not_found(T::KIND, id))
    }

    /// Load every entity of a kind.
    pub async fn get_all<T: Entity>(&self) -> Result<Vec<T>> {
        let mut rows: BTreeMap<Uuid, Value> =
            self.store.load_all(T::KIND).await?.into_iter().collect();
        for change in self.staged().filter(|c| c.kind() == T::KIND) {
            match change.row() {
                Some(value) => {
                    rows.insert(change.id(), value.clone());
                }
                None => {
                    rows.remove(&change.id());
                }
            }
        }
        rows.into_values().map(decode).collect()
    }

    /// Load every entity of a kind matching a predicate.
    pub async fn find<T: Entity>(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        Ok(self
            .get_all::<T>()
            .await?
            .into_iter()
            .filter(|entity| predicate(entity))
            .collect())
    }

    pub fn add<T: Entity>(&mut self, entity: &T) -> Result<()> {
        self.pending.push(Change::Insert {
            kind: T::KIND,
            id: entity.id(),
            value: serde_json::to_value(entity)?,
        });
        Ok(())
    }

    pub fn update<T: Entity>(&mut self, entity: &T) -> Result<()> {
        self.pending.push(Change::Update {
            kind: T::KIND,
            id: entity.id(),
            value: serde_json::to_value(entity)?,
        });
        Ok(())
    }

    pub fn delete<T: Entity>(&mut self, entity: &T) {
        self.pending.push(Change::Delete {
            kind: T::KIND,
            id: entity.id(),
        });
    }

    /// Drop everything staged since the last save.
    pub fn discard_changes(&mut self) {
        self.pending.clear();
    }

    /// Number of changes staged since the last save.
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    /// Commit staged changes and return the number of rows affected.
    ///
    /// Inside a transaction the changes move to the transaction buffer and
    /// reach the store on [`commit_transaction`](Self::commit_transaction).
    /// A cancelled request commits nothing and keeps its changes staged.
    pub async fn save_changes(&mut self, cancel: &Cancellation) -> Result<usize> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(buffer) = self.transaction.as_mut() {
            let staged = self.pending.len();
            buffer.append(&mut self.pending);
            return Ok(staged);
        }
        if self.pending.is_empty() {
            return Ok(0);
        }

        let batch = self.pending.clone();
        let affected = commit(self.store.as_ref(), batch, cancel).await?;
        self.pending.clear();
        debug!(affected, "Saved changes");
        Ok(affected)
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Err(Error::internal("A transaction is already open"));
        }
        self.transaction = Some(Vec::new());
        Ok(())
    }

    /// Write every change saved inside the transaction as one batch.
    pub async fn commit_transaction(&mut self, cancel: &Cancellation) -> Result<usize> {
        let Some(buffer) = self.transaction.take() else {
            return Err(Error::internal("No transaction is open"));
        };
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if buffer.is_empty() {
            return Ok(0);
        }
        commit(self.store.as_ref(), buffer, cancel).await
    }

    /// Discard the transaction buffer and anything staged but unsaved.
    pub fn rollback_transaction(&mut self) {
        self.transaction = None;
        self.pending.clear();
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn staged(&self) -> impl Iterator<Item = &Change> {
        self.transaction.iter().flatten().chain(self.pending.iter())
    }
}

async fn commit(store: &dyn Store, batch: Vec<Change>, cancel: &Cancellation) -> Result<usize> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = store.apply(batch) => result,
    }
}

fn decode<T: Entity>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::types::Route;

    fn route(description: &str) -> Route {
        Route {
            id: Uuid::new_v4(),
            van_id: Uuid::new_v4(),
            description: description.to_string(),
        }
    }

    fn uow(store: &Arc<MemoryStore>) -> UnitOfWork {
        UnitOfWork::new(store.clone())
    }

    #[tokio::test]
    async fn test_reads_own_writes_before_save() {
        let store = Arc::new(MemoryStore::new());
        let mut work = uow(&store);
        let morning = route("Morning");
        work.add(&morning).unwrap();

        assert!(work.get_by_id::<Route>(morning.id).await.unwrap().is_some());
        assert!(uow(&store).get_by_id::<Route>(morning.id).await.unwrap().is_none());

        assert_eq!(work.save_changes(&Cancellation::none()).await.unwrap(), 1);
        assert!(uow(&store).get_by_id::<Route>(morning.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_require_reports_not_found() {
        let store = Arc::new(MemoryStore::new());
        let err = uow(&store).require::<Route>(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { ref entity, .. } if entity == "Route"));
    }

    #[tokio::test]
    async fn test_staged_delete_hides_row() {
        let store = Arc::new(MemoryStore::new());
        let mut setup = uow(&store);
        let morning = route("Morning");
        setup.add(&morning).unwrap();
        setup.save_changes(&Cancellation::none()).await.unwrap();

        let mut work = uow(&store);
        work.delete(&morning);
        assert!(work.get_all::<Route>().await.unwrap().is_empty());
        assert_eq!(uow(&store).get_all::<Route>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_save_commits_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (source, cancel) = Cancellation::pair();
        source.cancel();

        let mut work = uow(&store);
        work.add(&route("Evening")).unwrap();
        let err = work.save_changes(&cancel).await.unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(work.pending_changes(), 1);
        assert_eq!(store.count(Route::KIND).await, 0);
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let store = Arc::new(MemoryStore::new());
        let mut work = uow(&store);

        work.begin_transaction().unwrap();
        work.add(&route("A")).unwrap();
        work.save_changes(&Cancellation::none()).await.unwrap();
        assert_eq!(store.count(Route::KIND).await, 0);
        assert_eq!(work.commit_transaction(&Cancellation::none()).await.unwrap(), 1);
        assert_eq!(store.count(Route::KIND).await, 1);

        work.begin_transaction().unwrap();
        work.add(&route("B")).unwrap();
        work.save_changes(&Cancellation::none()).await.unwrap();
        work.rollback_transaction();
        assert!(!work.in_transaction());
        assert_eq!(store.count(Route::KIND).await, 1);
    }

    #[tokio::test]
    async fn test_nested_transaction_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut work = uow(&store);
        work.begin_transaction().unwrap();
        assert!(work.begin_transaction().is_err());
    }
}
