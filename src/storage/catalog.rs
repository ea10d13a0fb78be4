//! Table registry: resolves which store backs a page's table.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Error, Result, TableId};
use crate::storage::PageStore;

/// Resolves a table to the page store that backs it.
pub trait Catalog: Send + Sync {
    /// # Errors
    /// `Error::TableNotFound` if no store is registered for `table`.
    fn store_for(&self, table: TableId) -> Result<Arc<dyn PageStore>>;
}

/// In-memory [`Catalog`].
///
/// Each buffer pool is handed its own registry, so independent
/// instances never share table state.
#[derive(Default)]
pub struct TableRegistry {
    stores: RwLock<HashMap<TableId, Arc<dyn PageStore>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under its own table id, replacing any previous one.
    pub fn register(&self, store: Arc<dyn PageStore>) {
        self.stores.write().insert(store.table_id(), store);
    }

    /// Remove a table. Returns the store if it was registered.
    pub fn remove(&self, table: TableId) -> Option<Arc<dyn PageStore>> {
        self.stores.write().remove(&table)
    }

    /// Registered table ids, sorted.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.stores.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }
}

impl Catalog for TableRegistry {
    fn store_for(&self, table: TableId) -> Result<Arc<dyn PageStore>> {
        self.stores
            .read()
            .get(&table)
            .cloned()
            .ok_or(Error::TableNotFound(table))
    }
}
