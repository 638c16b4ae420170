//! Adapters connecting the framework crates to each other.

mod notification_bridge;
mod record_store;

pub use notification_bridge::NotificationBridge;
pub use record_store::RecordStore;
