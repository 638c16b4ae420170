//! # Dispatch Loop
//!
//! Owns the receive side of a [`MessageTransport`](xf_02_transport::MessageTransport):
//! every inbound envelope is classified once and routed either to the
//! subscription machinery or to user handlers.
//!
//! ```text
//!                  ┌──────────────┐
//!   receive() ───→ │   classify   │
//!                  └──────┬───────┘
//!          Notification   │   User
//!        ┌────────────────┴────────────────┐
//!        ▼                                 ▼
//!  NotificationSink               shard by subscription_id
//!  (in order, on the                ┌────┬────┬────┐
//!   loop task)                      │ w0 │ w1 │ wN │  bounded mpsc
//!                                   └────┴────┴────┘
//!                                   MessageHandler (panics caught)
//! ```
//!
//! ## Guarantees
//!
//! - Subscription notifications never reach user handlers.
//! - Messages with the same subscription id are handled by one worker, in
//!   delivery order.
//! - A failing or panicking handler is logged and counted; the loop and the
//!   worker keep running.
//! - The loop ends when the transport reports `Closed`, or on the shutdown
//!   signal after dispatching whatever was still queued.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod handlers;
pub mod ports;
pub mod service;

pub use domain::{DispatchConfig, DispatchStats, HandlerError, InboundMessage};
pub use handlers::HandlerTable;
pub use ports::outbound::{MessageHandler, NotificationSink};
pub use service::{DispatchStatsHandle, Dispatcher};
