use crate::domain::{LocalId, StoreError, SubscriptionRecord};
use crate::ports::outbound::SubscriptionStore;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory record store.
///
/// Used by tests and by xApps that do not need records to survive a restart.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    records: RwLock<HashMap<LocalId, SubscriptionRecord>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, local_id: LocalId) -> Option<SubscriptionRecord> {
        self.records.read().get(&local_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn save(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        self.records.write().insert(record.local_id, record.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn remove(&self, local_id: LocalId) -> Result<(), StoreError> {
        self.records.write().remove(&local_id);
        Ok(())
    }
}
