//! # Route Table
//!
//! Static `(message_type, subscription_id) -> endpoints` mapping loaded into
//! a fabric. A route without a subscription id matches every subscription
//! id of that type that has no more specific route.

use serde::{Deserialize, Serialize};
use shared_types::{MessageType, SubscriptionId, NO_SUBSCRIPTION_ID};
use std::collections::HashMap;

/// One configured route.
///
/// ```toml
/// [[routes]]
/// message_type = 12050
/// subscription_id = 7
/// endpoints = ["kpimon"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub message_type: MessageType,
    #[serde(default)]
    pub subscription_id: Option<SubscriptionId>,
    pub endpoints: Vec<String>,
}

/// Resolved route table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<(MessageType, SubscriptionId), Vec<String>>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from configured entries. Entries for the same key are
    /// merged, keeping the first occurrence of each endpoint.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = RouteEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            for endpoint in entry.endpoints {
                table.add(entry.message_type, entry.subscription_id, endpoint);
            }
        }
        table
    }

    /// Route `message_type` (optionally only for `subscription_id`) to
    /// `endpoint`.
    pub fn add(
        &mut self,
        message_type: MessageType,
        subscription_id: Option<SubscriptionId>,
        endpoint: impl Into<String>,
    ) {
        let endpoint = endpoint.into();
        let key = (message_type, subscription_id.unwrap_or(NO_SUBSCRIPTION_ID));
        let endpoints = self.routes.entry(key).or_default();
        if !endpoints.contains(&endpoint) {
            endpoints.push(endpoint);
        }
    }

    /// Builder-style [`RouteTable::add`].
    #[must_use]
    pub fn with_route(
        mut self,
        message_type: MessageType,
        subscription_id: Option<SubscriptionId>,
        endpoint: impl Into<String>,
    ) -> Self {
        self.add(message_type, subscription_id, endpoint);
        self
    }

    /// Receivers for a message: the exact `(type, sub_id)` route, else the
    /// type-wide route.
    #[must_use]
    pub fn resolve(
        &self,
        message_type: MessageType,
        subscription_id: SubscriptionId,
    ) -> Option<&[String]> {
        self.routes
            .get(&(message_type, subscription_id))
            .or_else(|| self.routes.get(&(message_type, NO_SUBSCRIPTION_ID)))
            .map(Vec::as_slice)
    }

    /// Number of distinct route keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
