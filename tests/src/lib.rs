//! # xApp Framework Test Suite
//!
//! Scenarios that need more than one crate: a runtime, a peer on the same
//! fabric, and a stand-in for the RIC subscription service.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── transport_benchmarks.rs   # Send/receive through the fabric
//! └── src/integration/
//!     ├── fixtures.rs               # Fake subscription service, peers
//!     ├── transport_flow.rs         # Routing, retries, return-to-sender
//!     └── subscription_flow.rs      # Subscription lifecycle over the fabric
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p xf-tests
//! cargo test -p xf-tests integration::subscription_flow
//!
//! # Benchmarks
//! cargo bench -p xf-tests
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod integration;
