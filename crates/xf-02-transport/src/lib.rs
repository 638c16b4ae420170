//! # Transport Wrapper
//!
//! Turns the routing fabric's unreliable, shared-route-table delivery into a
//! send / receive / return-to-sender API with explicit retry and
//! backpressure semantics.
//!
//! ## Send Outcomes
//!
//! | Fabric result | Transport result | Retried |
//! |---------------|------------------|---------|
//! | delivered | `Ok(SendReport)` | - |
//! | saturated | `Transient { attempts }` after `send_retries` retries | yes, `retry_delay` apart |
//! | no receiver | `NoRoute` | no |
//! | not ready | `NotReady` | no |
//! | malformed envelope | `Fatal` | no |
//! | after shutdown | `Closed` | no |
//!
//! ## Lifecycle
//!
//! ```text
//! Transport::new ──→ wait_until_ready ──→ send / receive ... ──→ shutdown
//!   (attach)            (route table)                         (stop sends,
//!                                                              detach, drain)
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! ports/inbound.rs - MessageTransport trait (what the dispatch loop uses)
//! domain.rs        - TransportConfig, ReceiveMode, Received, SendReport, stats
//! service.rs       - Transport<F: RoutingFabric>
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{ReceiveMode, Received, SendReport, TransportConfig, TransportStatsSnapshot};
pub use ports::inbound::MessageTransport;
pub use service::Transport;
