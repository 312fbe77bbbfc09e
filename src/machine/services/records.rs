//! JSON persistence of machine records over a key/value store.

use super::executor::RecordSaver;
use crate::machine::{
    domain::{MachineName, MachineRecord, MachineRequest},
    ports::{KeyValueStore, StoreError, StoreKey, StoreResult},
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

const MACHINES_SEGMENT: &str = "machines";
const RECORD_LEAF: &str = "record";
const STATE_LEAF: &str = "state";

/// Record repository storing each machine under `machines/<name>/`.
///
/// The record lives at `machines/<name>/record` and the last machine state
/// adopted by a pipeline at `machines/<name>/state`.
#[derive(Debug)]
pub struct MachineRecordStore<S>
where
    S: KeyValueStore,
{
    store: Arc<S>,
}

impl<S> Clone for MachineRecordStore<S>
where
    S: KeyValueStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

fn machine_prefix() -> StoreResult<StoreKey> {
    StoreKey::root().join(MACHINES_SEGMENT)
}

fn machine_key(name: &MachineName, leaf: &str) -> StoreResult<StoreKey> {
    machine_prefix()?.join(name.as_str())?.join(leaf)
}

impl<S> MachineRecordStore<S>
where
    S: KeyValueStore,
{
    /// Creates a record store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persists a record and the machine state that goes with it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when encoding or the underlying write fails.
    pub async fn save(&self, record: &MachineRecord, state: &MachineRequest) -> StoreResult<()> {
        let name = record.machine_name();
        let encoded_state = serde_json::to_vec(state).map_err(StoreError::serialization)?;
        let encoded_record = serde_json::to_vec(record).map_err(StoreError::serialization)?;
        self.store
            .save(&machine_key(name, STATE_LEAF)?, encoded_state)
            .await?;
        self.store
            .save(&machine_key(name, RECORD_LEAF)?, encoded_record)
            .await
    }

    /// Loads a record by machine name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails or the stored value cannot
    /// be decoded.
    pub async fn find(&self, name: &MachineName) -> StoreResult<Option<MachineRecord>> {
        self.load(machine_key(name, RECORD_LEAF)?).await
    }

    /// Loads the last persisted machine state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails or the stored value cannot
    /// be decoded.
    pub async fn machine_state(&self, name: &MachineName) -> StoreResult<Option<MachineRequest>> {
        self.load(machine_key(name, STATE_LEAF)?).await
    }

    /// Loads every stored record in machine-name order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing, reading or decoding fails.
    pub async fn list(&self) -> StoreResult<Vec<MachineRecord>> {
        let keys = self.store.list_recursive(&machine_prefix()?).await?;
        let mut records = Vec::new();
        for key in keys.into_iter().filter(|key| key.leaf() == Some(RECORD_LEAF)) {
            if let Some(record) = self.load(key).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Removes a machine's record and state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no record exists, or other store
    /// errors when deletion fails.
    pub async fn delete(&self, name: &MachineName) -> StoreResult<()> {
        self.store.delete(&machine_key(name, RECORD_LEAF)?).await?;
        match self.store.delete(&machine_key(name, STATE_LEAF)?).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn load<T: DeserializeOwned>(&self, key: StoreKey) -> StoreResult<Option<T>> {
        let Some(bytes) = self.store.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| StoreError::invalid_persisted_data(key, err))
    }
}

#[async_trait]
impl<S> RecordSaver for MachineRecordStore<S>
where
    S: KeyValueStore + 'static,
{
    async fn save(&self, record: &MachineRecord, state: &MachineRequest) -> StoreResult<()> {
        Self::save(self, record, state).await
    }
}
