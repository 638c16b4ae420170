//! Ports layer for the dispatch loop.
//!
//! Only driven ports: the loop calls out to handlers and to the
//! subscription machinery.

pub mod outbound;
