//! Ports layer for the transport wrapper.

pub mod inbound;
