//! Subscription domain layer: entities, the per-record state machine,
//! configuration and errors. No I/O.

pub mod config;
pub mod entities;
pub mod errors;
pub mod record;

pub use config::SubscriptionConfig;
pub use entities::*;
pub use errors::{ClientError, StoreError, SubscriptionError};
pub use record::{SubmissionOutcome, SubscriptionRecord, TimerAction, Transition};
