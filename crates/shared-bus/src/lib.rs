//! # Shared Bus - Routing Fabric Boundary
//!
//! The narrow contract the transport wrapper needs from a message-routing
//! fabric, plus an in-memory fabric that honours it.
//!
//! ## Routing Model
//!
//! ```text
//! ┌──────────────┐   route(type, sub_id)   ┌──────────────┐
//! │   Sender     │ ──────┐                 │   Receiver   │
//! │              │       │                 │   Mailbox    │
//! └──────────────┘       ▼                 └──────────────┘
//!                  ┌──────────────┐               ↑
//!                  │ Route Table  │ ──────────────┘
//!                  │ (type, sub)  │   bounded mpsc
//!                  └──────────────┘
//! ```
//!
//! - Routes are keyed by `(message_type, subscription_id)` and fall back to
//!   `(message_type, -1)`.
//! - Mailboxes are bounded; a full mailbox is reported as `Saturated` and
//!   nothing is delivered to any receiver.
//! - The fabric is not ready until a route table has been loaded.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod fabric;
pub mod mailbox;
pub mod memory;
pub mod pool;
pub mod routes;

// Re-export main types
pub use fabric::{FabricError, RoutingFabric};
pub use mailbox::{Mailbox, MailboxClosed};
pub use memory::{FabricStats, InMemoryFabric};
pub use pool::{BufferPool, BufferPoolStats};
pub use routes::{RouteEntry, RouteTable};

/// Messages buffered per mailbox before the fabric reports saturation.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;
