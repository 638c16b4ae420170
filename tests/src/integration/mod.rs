//! # Integration Flows
//!
//! - `transport_flow`: two endpoints on one fabric, routing and retry paths
//! - `subscription_flow`: a full runtime against a fake subscription
//!   service that confirms requests over the fabric

pub mod fixtures;
pub mod subscription_flow;
pub mod transport_flow;
