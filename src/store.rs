//! # Inventory Store Module
//!
//! The persistence collaborator: create, partial update, delete and list of
//! inventory records. Identifiers are assigned by the store. Quantity rules
//! (non-negative totals) are the caller's business, not the store's.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::PantryError;
use crate::inventory_model::{InventoryItem, ItemPatch};

/// Document store holding one user's inventory
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Persist a new record and return it with its assigned id
    async fn create(&self, item: &InventoryItem) -> Result<InventoryItem, PantryError>;

    /// Apply a partial update and return the stored record
    async fn update(&self, id: &str, patch: &ItemPatch) -> Result<InventoryItem, PantryError>;

    /// Remove a record
    async fn delete(&self, id: &str) -> Result<(), PantryError>;

    /// Every record, in creation order
    async fn list_all(&self) -> Result<Vec<InventoryItem>, PantryError>;
}

#[async_trait]
impl<T: InventoryStore + ?Sized> InventoryStore for Arc<T> {
    async fn create(&self, item: &InventoryItem) -> Result<InventoryItem, PantryError> {
        (**self).create(item).await
    }

    async fn update(&self, id: &str, patch: &ItemPatch) -> Result<InventoryItem, PantryError> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), PantryError> {
        (**self).delete(id).await
    }

    async fn list_all(&self) -> Result<Vec<InventoryItem>, PantryError> {
        (**self).list_all().await
    }
}

/// Process-local store, used when no database is configured and in tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: Mutex<Vec<InventoryItem>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with records; items without an id get one
    ///
    /// Generated ids continue after the highest `item-N` already supplied.
    pub fn with_items(items: Vec<InventoryItem>) -> Self {
        let store = Self::new();
        let highest = items
            .iter()
            .filter_map(|item| item.id.as_deref()?.strip_prefix("item-")?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        store.next_id.store(highest, Ordering::Relaxed);
        {
            let mut guard = store.items.lock().unwrap_or_else(|e| e.into_inner());
            for mut item in items {
                if item.id.is_none() {
                    item.id = Some(store.allocate_id());
                }
                guard.push(item);
            }
        }
        store
    }

    fn allocate_id(&self) -> String {
        format!("item-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<InventoryItem>>, PantryError> {
        self.items
            .lock()
            .map_err(|_| PantryError::Persistence("in-memory store lock poisoned".to_string()))
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn create(&self, item: &InventoryItem) -> Result<InventoryItem, PantryError> {
        let now = Utc::now();
        let mut stored = item.clone();
        stored.id = Some(self.allocate_id());
        stored.created_at = Some(now);
        stored.updated_at = Some(now);

        self.lock()?.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &str, patch: &ItemPatch) -> Result<InventoryItem, PantryError> {
        let mut items = self.lock()?;
        let item = items
            .iter_mut()
            .find(|item| item.id.as_deref() == Some(id))
            .ok_or_else(|| PantryError::NotFound(id.to_string()))?;
        item.apply_patch(patch);
        item.updated_at = Some(Utc::now());
        Ok(item.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), PantryError> {
        let mut items = self.lock()?;
        let before = items.len();
        items.retain(|item| item.id.as_deref() != Some(id));
        if items.len() == before {
            return Err(PantryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<InventoryItem>, PantryError> {
        Ok(self.lock()?.clone())
    }
}
