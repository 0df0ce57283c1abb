//! In-memory store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{Change, Store};
use crate::error::{Error, Result};

/// A [`Store`] keeping every table in process memory.
///
/// A batch is checked against the current rows and the earlier changes of
/// the same batch before anything is written, all under one write lock, so
/// concurrent batches serialize and a rejected batch leaves no trace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<Uuid, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows of one kind.
    pub async fn count(&self, kind: &str) -> usize {
        self.tables.read().await.get(kind).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, kind: &str, id: Uuid) -> Result<Option<Value>> {
        let tables = self.tables.read().await;
        Ok(tables.get(kind).and_then(|table| table.get(&id)).cloned())
    }

    async fn load_all(&self, kind: &str) -> Result<Vec<(Uuid, Value)>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(kind)
            .map(|table| table.iter().map(|(id, value)| (*id, value.clone())).collect())
            .unwrap_or_default())
    }

    async fn apply(&self, changes: Vec<Change>) -> Result<usize> {
        let mut tables = self.tables.write().await;

        let mut exists: HashMap<(&'static str, Uuid), bool> = HashMap::new();
        for change in &changes {
            let key = (change.kind(), change.id());
            let present = match exists.get(&key) {
                Some(present) => *present,
                None => tables
                    .get(change.kind())
                    .is_some_and(|table| table.contains_key(&change.id())),
            };
            match change {
                Change::Insert { .. } if present => {
                    return Err(Error::conflict(format!(
                        "{} ({}) already exists",
                        change.kind(),
                        change.id()
                    )));
                }
                Change::Update { .. } | Change::Delete { .. } if !present => {
                    return Err(Error::conflict(format!(
                        "{} ({}) no longer exists",
                        change.kind(),
                        change.id()
                    )));
                }
                _ => {}
            }
            exists.insert(key, !matches!(change, Change::Delete { .. }));
        }

        let affected = changes.len();
        for change in changes {
            match change {
                Change::Insert { kind, id, value } | Change::Update { kind, id, value } => {
                    tables.entry(kind.to_string()).or_default().insert(id, value);
                }
                Change::Delete { kind, id } => {
                    if let Some(table) = tables.get_mut(kind) {
                        table.remove(&id);
                    }
                }
            }
        }

        debug!(affected, "Applied change batch");
        Ok(affected)
    }
}
