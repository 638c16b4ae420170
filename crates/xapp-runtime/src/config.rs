//! # xApp Configuration
//!
//! One TOML document, every section optional, then `XAPP_*` environment
//! overrides.
//!
//! ```toml
//! [xapp]
//! name = "kpimon"
//! host = "10.0.0.12"
//! control_port = 8080
//! data_port = 4560
//!
//! [transport]
//! max_payload_size = 65536
//! send_retries = 3
//!
//! [dispatch]
//! workers = 4
//!
//! [subscription]
//! max_retries = 3
//! confirmation_timeout_ms = 5000
//! service_endpoint = "submgr"
//! service_host = "service-ricplt-submgr-http.ricplt"
//! service_port = 8088
//! store_dir = "/var/lib/kpimon/subscriptions"
//!
//! [[routes]]
//! message_type = 12050
//! endpoints = ["kpimon"]
//! ```

use serde::Deserialize;
use shared_bus::{RouteEntry, RouteTable};
use shared_types::Endpoint;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use xf_02_transport::TransportConfig;
use xf_03_dispatch::DispatchConfig;
use xf_04_subscriptions::{HttpClientConfig, SubscriptionConfig};

/// Hard ceiling for `transport.max_payload_size`.
pub const MAX_PAYLOAD_LIMIT: usize = 16 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: String, value: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Complete xApp configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct XappConfig {
    pub xapp: XappSection,
    pub transport: TransportSection,
    pub dispatch: DispatchSection,
    pub subscription: SubscriptionSection,
    /// Static route table for the fabric. Empty means the fabric waits for
    /// routes from elsewhere.
    pub routes: Vec<RouteEntry>,
}

/// Identity of this xApp.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XappSection {
    pub name: String,
    pub host: String,
    pub control_port: u16,
    pub data_port: u16,
    /// How often component stats are copied into the Prometheus gauges.
    pub metrics_interval_ms: u64,
}

impl Default for XappSection {
    fn default() -> Self {
        Self {
            name: "xapp".to_string(),
            host: "127.0.0.1".to_string(),
            control_port: 8080,
            data_port: 4560,
            metrics_interval_ms: 5_000,
        }
    }
}

/// Transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    pub max_payload_size: usize,
    pub send_retries: u32,
    pub retry_delay_ms: u64,
    pub mailbox_capacity: usize,
    /// How long `start` waits for the fabric's route table.
    pub ready_timeout_ms: u64,
    pub ready_poll_interval_ms: u64,
    pub buffer_pool_size: usize,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            max_payload_size: 65_536,
            send_retries: 3,
            retry_delay_ms: 10,
            mailbox_capacity: shared_bus::DEFAULT_MAILBOX_CAPACITY,
            ready_timeout_ms: 30_000,
            ready_poll_interval_ms: 100,
            buffer_pool_size: 64,
        }
    }
}

/// Dispatch loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    pub workers: usize,
    pub queue_depth: usize,
    pub poll_interval_ms: u64,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 256,
            poll_interval_ms: 100,
        }
    }
}

/// Subscription manager and subscription service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubscriptionSection {
    pub max_retries: u32,
    pub confirmation_timeout_ms: u64,
    pub timer_interval_ms: u64,
    pub event_capacity: usize,
    /// Registry name of the subscription service.
    pub service_endpoint: String,
    pub service_host: String,
    pub service_port: u16,
    /// Explicit base URL; bypasses registry resolution.
    pub service_url: Option<String>,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub connect_attempts: u32,
    pub connect_retry_delay_ms: u64,
    /// Directory for persisted records. In-memory only when unset.
    pub store_dir: Option<PathBuf>,
}

impl Default for SubscriptionSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            confirmation_timeout_ms: 5_000,
            timer_interval_ms: 500,
            event_capacity: 256,
            service_endpoint: "submgr".to_string(),
            service_host: "service-ricplt-submgr-http.ricplt".to_string(),
            service_port: 8088,
            service_url: None,
            request_timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
            connect_attempts: 3,
            connect_retry_delay_ms: 200,
            store_dir: None,
        }
    }
}

impl XappConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// File (if any), then process environment, then validation.
    pub fn from_file_and_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `XAPP_*` overrides from `lookup`.
    ///
    /// # Errors
    /// `Env` when a numeric variable does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("XAPP_NAME") {
            self.xapp.name = v;
        }
        if let Some(v) = lookup("XAPP_HOST") {
            self.xapp.host = v;
        }
        override_parsed(&lookup, "XAPP_CONTROL_PORT", &mut self.xapp.control_port)?;
        override_parsed(&lookup, "XAPP_DATA_PORT", &mut self.xapp.data_port)?;

        override_parsed(&lookup, "XAPP_MAX_PAYLOAD_SIZE", &mut self.transport.max_payload_size)?;
        override_parsed(&lookup, "XAPP_SEND_RETRIES", &mut self.transport.send_retries)?;
        override_parsed(&lookup, "XAPP_MAILBOX_CAPACITY", &mut self.transport.mailbox_capacity)?;
        override_parsed(&lookup, "XAPP_READY_TIMEOUT_MS", &mut self.transport.ready_timeout_ms)?;

        override_parsed(&lookup, "XAPP_WORKERS", &mut self.dispatch.workers)?;

        override_parsed(&lookup, "XAPP_SUB_MAX_RETRIES", &mut self.subscription.max_retries)?;
        override_parsed(
            &lookup,
            "XAPP_SUB_TIMEOUT_MS",
            &mut self.subscription.confirmation_timeout_ms,
        )?;
        if let Some(v) = lookup("XAPP_SUBMGR_URL") {
            self.subscription.service_url = Some(v);
        }
        if let Some(v) = lookup("XAPP_SUBMGR_HOST") {
            self.subscription.service_host = v;
        }
        override_parsed(&lookup, "XAPP_SUBMGR_PORT", &mut self.subscription.service_port)?;
        if let Some(v) = lookup("XAPP_STORE_DIR") {
            self.subscription.store_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Reject settings the runtime cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.xapp.name.trim().is_empty() {
            return Err(invalid("xapp.name", "must not be empty"));
        }
        if self.transport.max_payload_size == 0 || self.transport.max_payload_size > MAX_PAYLOAD_LIMIT {
            return Err(invalid(
                "transport.max_payload_size",
                format!("must be between 1 and {MAX_PAYLOAD_LIMIT}"),
            ));
        }
        if self.transport.mailbox_capacity == 0 {
            return Err(invalid("transport.mailbox_capacity", "must be positive"));
        }
        if self.dispatch.workers == 0 {
            return Err(invalid("dispatch.workers", "must be positive"));
        }
        if self.dispatch.queue_depth == 0 {
            return Err(invalid("dispatch.queue_depth", "must be positive"));
        }
        if self.subscription.confirmation_timeout_ms == 0 {
            return Err(invalid("subscription.confirmation_timeout_ms", "must be positive"));
        }
        if self.subscription.timer_interval_ms == 0 {
            return Err(invalid("subscription.timer_interval_ms", "must be positive"));
        }
        if self.subscription.event_capacity == 0 {
            return Err(invalid("subscription.event_capacity", "must be positive"));
        }
        for route in &self.routes {
            if route.endpoints.is_empty() {
                return Err(invalid(
                    "routes",
                    format!("route for type {} has no endpoints", route.message_type),
                ));
            }
        }
        Ok(())
    }

    /// The local endpoint.
    #[must_use]
    pub fn identity(&self) -> Endpoint {
        Endpoint::new(
            self.xapp.name.clone(),
            self.xapp.host.clone(),
            self.xapp.control_port,
            self.xapp.data_port,
        )
    }

    /// The subscription service endpoint as configured.
    #[must_use]
    pub fn service_endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.subscription.service_endpoint.clone(),
            self.subscription.service_host.clone(),
            self.subscription.service_port,
            0,
        )
    }

    #[must_use]
    pub fn route_table(&self) -> RouteTable {
        RouteTable::from_entries(self.routes.iter().cloned())
    }

    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        let t = &self.transport;
        TransportConfig {
            max_payload_size: t.max_payload_size,
            send_retries: t.send_retries,
            retry_delay: Duration::from_millis(t.retry_delay_ms),
            mailbox_capacity: t.mailbox_capacity,
            ready_poll_interval: Duration::from_millis(t.ready_poll_interval_ms),
            buffer_pool_size: t.buffer_pool_size,
        }
    }

    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.ready_timeout_ms)
    }

    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            workers: self.dispatch.workers,
            queue_depth: self.dispatch.queue_depth,
            poll_interval: Duration::from_millis(self.dispatch.poll_interval_ms),
        }
    }

    #[must_use]
    pub fn subscription_config(&self) -> SubscriptionConfig {
        let s = &self.subscription;
        SubscriptionConfig {
            max_retries: s.max_retries,
            confirmation_timeout: Duration::from_millis(s.confirmation_timeout_ms),
            timer_interval: Duration::from_millis(s.timer_interval_ms),
            event_capacity: s.event_capacity,
        }
    }

    /// HTTP client settings for `base_url`.
    #[must_use]
    pub fn http_client_config(&self, base_url: String) -> HttpClientConfig {
        let s = &self.subscription;
        HttpClientConfig {
            base_url,
            request_timeout: Duration::from_millis(s.request_timeout_ms),
            connect_timeout: Duration::from_millis(s.connect_timeout_ms),
            connect_attempts: s.connect_attempts,
            connect_retry_delay: Duration::from_millis(s.connect_retry_delay_ms),
            client_endpoint: Some(format!("{}:{}", self.xapp.name, self.xapp.data_port)),
        }
    }

    #[must_use]
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.xapp.metrics_interval_ms.max(1))
    }
}

fn override_parsed<F, V>(lookup: &F, var: &str, target: &mut V) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    V: std::str::FromStr,
{
    if let Some(value) = lookup(var) {
        *target = value.trim().parse().map_err(|_| ConfigError::Env {
            var: var.to_string(),
            value,
        })?;
    }
    Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
