//! # Subscription Manager
//!
//! Tracks every subscription an xApp holds with the RIC subscription
//! service, from the first create request to the confirmed deletion.
//!
//! ## Protocol
//!
//! Requests go out over HTTP ([`SubscriptionClient`]). Their outcome comes
//! back later as a fabric notification, which the dispatch loop hands to
//! [`SubscriptionManager::handle_notification`]. Nothing is considered
//! active until that notification arrives. Handling a notification never
//! waits on HTTP, so the dispatch loop keeps receiving.
//!
//! ```text
//!  create() ──HTTP──→ service ──notification──→ handle_notification()
//!     │                                              │
//!  [Pending] ── timer: no confirmation ──→ resubmit  │
//!     │         (same transaction id, max_retries)   ▼
//!     └──────────────────────────────────────→ [Active]
//! ```
//!
//! ## Invariants
//!
//! - A local id is tracked at most once.
//! - A record is persisted before its create request is sent.
//! - A notification is applied only if its transaction id matches the
//!   record's current phase; anything else is discarded.
//! - Retries re-send the original request verbatim.
//! - `Failed` records stay queryable and are never retried.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemorySubscriptionStore;
#[cfg(feature = "file-store")]
pub use adapters::JsonFileStore;
#[cfg(feature = "http")]
pub use adapters::{HttpClientConfig, HttpSubscriptionClient};
pub use domain::{
    ClientError, DeleteOutcome, FailureKind, LocalId, RemoteId, StoreError, SubscriptionConfig,
    SubscriptionError, SubscriptionEvent, SubscriptionFailure, SubscriptionRecord,
    SubscriptionRequest, SubscriptionState,
};
pub use ports::inbound::SubscriptionApi;
pub use ports::outbound::{SubscriptionClient, SubscriptionStore, SystemTimeSource, TimeSource};
#[cfg(any(test, feature = "test-utils"))]
pub use ports::outbound::{ClientCall, MockSubscriptionClient, MockTimeSource};
pub use service::{ManagerStats, StateCounts, SubscriptionManager};
