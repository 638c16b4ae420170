//! # xApp Runtime Library
//!
//! Wiring for a single xApp process. The `xapp-runtime` binary is a thin
//! shell around [`XappRuntime`]; xApps with their own handlers build one
//! directly.
//!
//! ```text
//!   XappConfig ──→ XappRuntime::new
//!                     ├─ InMemoryFabric (routes)
//!                     ├─ EndpointRegistry ──→ subscription service URL
//!                     ├─ Transport
//!                     ├─ SubscriptionManager (HTTP client, record store)
//!                     └─ start(): Dispatcher + retry timer + metrics
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod runtime;

pub use config::{ConfigError, XappConfig};
pub use runtime::{RuntimeError, XappRuntime, XappSubscriptions, XappTransport};
