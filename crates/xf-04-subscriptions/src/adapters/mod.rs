//! Adapters
//!
//! Implementations of the driven ports: record stores and the HTTP client
//! for the subscription service.

mod memory_store;
pub use memory_store::InMemorySubscriptionStore;

#[cfg(feature = "file-store")]
mod file_store;
#[cfg(feature = "file-store")]
pub use file_store::JsonFileStore;

#[cfg(feature = "http")]
mod http_client;
#[cfg(feature = "http")]
pub use http_client::{HttpClientConfig, HttpSubscriptionClient};
