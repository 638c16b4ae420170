//! # In-Memory Fabric
//!
//! Single-process [`RoutingFabric`] backed by bounded `tokio::sync::mpsc`
//! mailboxes. Suitable for tests and single-node operation; deployments
//! against a real routing fabric would bind a different implementation.

use crate::fabric::{FabricError, RoutingFabric};
use crate::mailbox::Mailbox;
use crate::routes::RouteTable;
use parking_lot::RwLock;
use shared_types::MessageEnvelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Delivery counters.
#[derive(Debug, Default)]
struct Stats {
    delivered: AtomicU64,
    unrouted: AtomicU64,
    saturated: AtomicU64,
}

/// Point-in-time copy of fabric counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FabricStats {
    /// Envelopes placed in a mailbox (one per receiver).
    pub delivered: u64,
    /// Deliveries refused for lack of a route or endpoint.
    pub unrouted: u64,
    /// Deliveries refused because a mailbox was full.
    pub saturated: u64,
}

/// In-memory implementation of the routing fabric.
pub struct InMemoryFabric {
    /// Attached endpoints by name.
    mailboxes: RwLock<HashMap<String, mpsc::Sender<MessageEnvelope>>>,

    /// Current route table.
    routes: RwLock<RouteTable>,

    /// Set once a route table has been loaded.
    ready: AtomicBool,

    /// Set by `close()`.
    closed: AtomicBool,

    stats: Stats,
}

impl InMemoryFabric {
    /// Create a fabric with no routes. It reports not-ready until
    /// [`InMemoryFabric::load_routes`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mailboxes: RwLock::new(HashMap::new()),
            routes: RwLock::new(RouteTable::new()),
            ready: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            stats: Stats::default(),
        }
    }

    /// Create a fabric that is immediately ready with `routes`.
    #[must_use]
    pub fn with_routes(routes: RouteTable) -> Self {
        let fabric = Self::new();
        fabric.load_routes(routes);
        fabric
    }

    /// Replace the route table and mark the fabric ready.
    pub fn load_routes(&self, routes: RouteTable) {
        info!(routes = routes.len(), "Route table loaded");
        *self.routes.write() = routes;
        self.ready.store(true, Ordering::Release);
    }

    /// Shut the fabric down. Every mailbox is disconnected and further
    /// deliveries fail with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.mailboxes.write().clear();
        debug!("Fabric closed");
    }

    /// Number of attached endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.mailboxes.read().len()
    }

    #[must_use]
    pub fn stats(&self) -> FabricStats {
        FabricStats {
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            unrouted: self.stats.unrouted.load(Ordering::Relaxed),
            saturated: self.stats.saturated.load(Ordering::Relaxed),
        }
    }

    fn check_open(&self) -> Result<(), FabricError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FabricError::Closed);
        }
        Ok(())
    }

    fn unrouted(&self, envelope: &MessageEnvelope) -> FabricError {
        self.stats.unrouted.fetch_add(1, Ordering::Relaxed);
        debug!(
            message_type = envelope.message_type(),
            subscription_id = envelope.subscription_id(),
            "No receiver for message"
        );
        FabricError::NoRoute
    }

    fn saturated(&self, endpoint: &str) -> FabricError {
        self.stats.saturated.fetch_add(1, Ordering::Relaxed);
        warn!(endpoint = endpoint, "Mailbox saturated");
        FabricError::Saturated
    }
}

impl Default for InMemoryFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingFabric for InMemoryFabric {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }

    fn attach(&self, endpoint: &str, capacity: usize) -> Mailbox {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let replaced = self
            .mailboxes
            .write()
            .insert(endpoint.to_string(), sender)
            .is_some();
        debug!(endpoint = endpoint, capacity = capacity, replaced = replaced, "Endpoint attached");
        Mailbox::new(endpoint.to_string(), receiver)
    }

    fn detach(&self, endpoint: &str) {
        if self.mailboxes.write().remove(endpoint).is_some() {
            debug!(endpoint = endpoint, "Endpoint detached");
        }
    }

    fn route(&self, envelope: &MessageEnvelope) -> Result<usize, FabricError> {
        self.check_open()?;
        if !self.ready.load(Ordering::Acquire) {
            return Err(FabricError::NotReady);
        }

        let routes = self.routes.read();
        let Some(targets) = routes.resolve(envelope.message_type(), envelope.subscription_id())
        else {
            return Err(self.unrouted(envelope));
        };

        // Reserve a slot in every receiver first so a single full mailbox
        // fails the whole delivery instead of delivering to some receivers.
        let mailboxes = self.mailboxes.read();
        let mut permits = Vec::with_capacity(targets.len());
        for name in targets {
            let Some(sender) = mailboxes.get(name) else {
                continue;
            };
            match sender.try_reserve() {
                Ok(permit) => permits.push(permit),
                Err(mpsc::error::TrySendError::Full(())) => return Err(self.saturated(name)),
                Err(mpsc::error::TrySendError::Closed(())) => continue,
            }
        }

        if permits.is_empty() {
            return Err(self.unrouted(envelope));
        }

        let delivered = permits.len();
        for permit in permits {
            permit.send(envelope.clone());
        }
        self.stats
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        Ok(delivered)
    }

    fn route_to(&self, endpoint: &str, envelope: &MessageEnvelope) -> Result<(), FabricError> {
        self.check_open()?;

        let mailboxes = self.mailboxes.read();
        let Some(sender) = mailboxes.get(endpoint) else {
            self.stats.unrouted.fetch_add(1, Ordering::Relaxed);
            return Err(FabricError::UnknownEndpoint(endpoint.to_string()));
        };

        match sender.try_send(envelope.clone()) {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(self.saturated(endpoint)),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.unrouted.fetch_add(1, Ordering::Relaxed);
                Err(FabricError::UnknownEndpoint(endpoint.to_string()))
            }
        }
    }
}
