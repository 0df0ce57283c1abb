//! Persistence collaborator
//!
//! Handlers never talk to a storage engine directly. They open a
//! [`UnitOfWork`] per request, read and stage changes through it, and commit
//! with [`UnitOfWork::save_changes`]. The unit of work talks to a [`Store`],
//! the seam a relational backend would implement; [`MemoryStore`] is the
//! backend shipped here.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vanfleet_core::persistence::{MemoryStore, UnitOfWork};
//! use vanfleet_core::types::Route;
//! use vanfleet_core::Cancellation;
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let mut uow = UnitOfWork::new(store.clone());
//! let route = Route { id: Uuid::new_v4(), van_id: Uuid::new_v4(), description: "Morning".into() };
//! uow.add(&route)?;
//! assert_eq!(uow.save_changes(&Cancellation::none()).await?, 1);
//!
//! let reader = UnitOfWork::new(store);
//! assert!(reader.get_by_id::<Route>(route.id).await?.is_some());
//! # Ok::<(), vanfleet_core::Error>(())
//! # }).unwrap();
//! ```

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

pub mod memory;
pub mod unit_of_work;

pub use memory::MemoryStore;
pub use unit_of_work::UnitOfWork;

/// A persistable entity.
///
/// `KIND` names the table the entity lives in and doubles as the entity
/// name in not-found errors.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> Uuid;
}

/// One staged mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Create a row; fails if the id already exists.
    Insert {
        kind: &'static str,
        id: Uuid,
        value: Value,
    },
    /// Replace a row; fails if the id does not exist.
    Update {
        kind: &'static str,
        id: Uuid,
        value: Value,
    },
    /// Remove a row; fails if the id does not exist.
    Delete { kind: &'static str, id: Uuid },
}

impl Change {
    pub fn kind(&self) -> &'static str {
        match self {
            Change::Insert { kind, .. }
            | Change::Update { kind, .. }
            | Change::Delete { kind, .. } => kind,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Change::Insert { id, .. }
            | Change::Update { id, .. }
            | Change::Delete { id, .. } => *id,
        }
    }

    /// The row as it reads after this change, `None` once deleted.
    pub(crate) fn row(&self) -> Option<&Value> {
        match self {
            Change::Insert { value, .. } | Change::Update { value, .. } => Some(value),
            Change::Delete { .. } => None,
        }
    }
}

/// Storage backend.
///
/// `apply` must be all-or-nothing: either every change of the batch is
/// visible afterwards or none is. A batch that deletes or updates a row that
/// no longer exists, or inserts one that already does, is rejected with
/// [`Error::Conflict`](crate::Error::Conflict).
#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self, kind: &str, id: Uuid) -> Result<Option<Value>>;

    async fn load_all(&self, kind: &str) -> Result<Vec<(Uuid, Value)>>;

    /// Apply a batch atomically and return the number of rows affected.
    async fn apply(&self, changes: Vec<Change>) -> Result<usize>;
}
