//! Ports layer for the subscription manager.
//!
//! - Inbound (driving): `SubscriptionApi`
//! - Outbound (driven): `SubscriptionClient`, `SubscriptionStore`, `TimeSource`

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
