//! Insertion-ordered endpoint table behind one `RwLock`. Re-registering a
//! known `(host, control_port)` merges into the existing entry.

use parking_lot::RwLock;
use shared_types::{Endpoint, EndpointKey};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Inner {
    /// Entries by registration sequence number.
    entries: BTreeMap<u64, Endpoint>,
    /// Key to sequence number.
    index: HashMap<EndpointKey, u64>,
    next_seq: u64,
}

/// Thread-safe endpoint directory. Share it through an `Arc`.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    inner: RwLock<Inner>,
}

impl EndpointRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sighting of `endpoint`.
    ///
    /// Returns `true` if the key was new. For a known key the existing entry
    /// keeps its position; `name` and `data_port` are refreshed if they
    /// changed.
    pub fn register(&self, endpoint: Endpoint) -> bool {
        let key = endpoint.key();
        let mut inner = self.inner.write();

        if let Some(seq) = inner.index.get(&key).copied() {
            if let Some(existing) = inner.entries.get_mut(&seq) {
                if existing.name != endpoint.name || existing.data_port != endpoint.data_port {
                    debug!(
                        endpoint = %key,
                        old_name = %existing.name,
                        new_name = %endpoint.name,
                        data_port = endpoint.data_port,
                        "Endpoint details updated"
                    );
                    existing.name = endpoint.name;
                    existing.data_port = endpoint.data_port;
                }
            }
            return false;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.index.insert(key, seq);
        info!(endpoint = %endpoint, "New endpoint registered");
        inner.entries.insert(seq, endpoint);
        true
    }

    #[must_use]
    pub fn lookup(&self, key: &EndpointKey) -> Option<Endpoint> {
        let inner = self.inner.read();
        inner
            .index
            .get(key)
            .and_then(|seq| inner.entries.get(seq))
            .cloned()
    }

    /// First registered endpoint with the given logical name.
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<Endpoint> {
        self.inner
            .read()
            .entries
            .values()
            .find(|e| e.name == name)
            .cloned()
    }

    pub fn remove(&self, key: &EndpointKey) -> Option<Endpoint> {
        let mut inner = self.inner.write();
        let seq = inner.index.remove(key)?;
        let removed = inner.entries.remove(&seq);
        if removed.is_some() {
            debug!(endpoint = %key, "Endpoint removed");
        }
        removed
    }

    /// Snapshot of every entry in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<Endpoint> {
        self.inner.read().entries.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
