//! # Shared Types Crate
//!
//! This crate contains the types every xApp framework crate agrees on: the
//! `MessageEnvelope` exchanged over the routing fabric, endpoint identities,
//! subscription notification payloads and the transport error taxonomy.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Cross-crate types are defined here only.
//! - **Immutable Envelopes**: A `MessageEnvelope` is never mutated after it is
//!   built; re-targeting a message produces a new envelope.
//! - **Typed Failures**: Every transport outcome maps onto `TransportError`.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ipc;

pub use entities::*;
pub use envelope::{DeliveryStatus, EnvelopeBuilder, MessageEnvelope, SourceIdentity};
pub use errors::*;
pub use ipc::*;
