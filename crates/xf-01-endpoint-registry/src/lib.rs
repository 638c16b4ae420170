//! # Endpoint Registry
//!
//! Directory of peers seen on the routing fabric, keyed by
//! `(host, control_port)`.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | One entry per `(host, control_port)` | `register()` merges into the existing entry |
//! | Stable ordering | `all()` returns entries in first-registration order |
//! | No expiry | entries leave only through `remove()` |
//!
//! ## Concurrency
//!
//! One `parking_lot::RwLock` guards the whole directory. Lookups run
//! concurrently, registrations are exclusive. `all()` hands out a snapshot,
//! never a live view.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod registry;

pub use registry::EndpointRegistry;
