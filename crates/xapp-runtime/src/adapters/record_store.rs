//! Store selection from configuration.

use std::path::Path;
use xf_04_subscriptions::{
    InMemorySubscriptionStore, JsonFileStore, LocalId, StoreError, SubscriptionRecord,
    SubscriptionStore,
};

/// The record store chosen by `subscription.store_dir`.
#[derive(Debug)]
pub enum RecordStore {
    Memory(InMemorySubscriptionStore),
    File(JsonFileStore),
}

impl RecordStore {
    /// A file store in `dir`, or an in-memory store when `dir` is `None`.
    ///
    /// # Errors
    /// `Io` if the directory cannot be created.
    pub fn open(dir: Option<&Path>) -> Result<Self, StoreError> {
        match dir {
            Some(dir) => Ok(Self::File(JsonFileStore::open(dir)?)),
            None => Ok(Self::Memory(InMemorySubscriptionStore::new())),
        }
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

impl SubscriptionStore for RecordStore {
    fn save(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.save(record),
            Self::File(store) => store.save(record),
        }
    }

    fn load_all(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        match self {
            Self::Memory(store) => store.load_all(),
            Self::File(store) => store.load_all(),
        }
    }

    fn remove(&self, local_id: LocalId) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.remove(local_id),
            Self::File(store) => store.remove(local_id),
        }
    }
}
