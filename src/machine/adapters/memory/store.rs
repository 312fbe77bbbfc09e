//! In-memory key/value store.

use crate::machine::ports::{KeyValueStore, StoreError, StoreKey, StoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory key/value store.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<BTreeMap<StoreKey, Vec<u8>>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn save(&self, key: &StoreKey, value: Vec<u8>) -> StoreResult<()> {
        if key.is_root() {
            return Err(StoreError::InvalidKey(String::new()));
        }
        let mut state = self.state.write().map_err(lock_error)?;
        state.insert(key.clone(), value);
        Ok(())
    }

    async fn get(&self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.get(key).cloned())
    }

    async fn list_recursive(&self, prefix: &StoreKey) -> StoreResult<Vec<StoreKey>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .range(prefix.clone()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &StoreKey) -> StoreResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }
}
