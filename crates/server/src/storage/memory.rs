//! [`MemoryStorage`]: an in-process map, for tests and embedding.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Storage, StorageError};

/// Immutable in-memory [`Storage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this store with `key` set to `value`.
    pub fn with_item(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut items = Arc::unwrap_or_clone(self.items);
        items.insert(key.into(), value.into());
        Self {
            items: Arc::new(items),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }
}
