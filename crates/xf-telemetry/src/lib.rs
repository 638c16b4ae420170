//! # xApp Telemetry
//!
//! Structured logging and Prometheus metrics shared by every xApp built on
//! the framework.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use xf_telemetry::{init_logging, register_metrics, TelemetryConfig};
//!
//! let _guard = init_logging(&TelemetryConfig::from_env())?;
//! register_metrics()?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `XAPP_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `XAPP_JSON_LOGS` | `true` in containers | JSON formatted logs |
//! | `XAPP_SERVICE_NAME` | `xapp` | Service name attached to startup logs |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, TelemetryGuard};
pub use metrics::{gather_metrics, register_metrics};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}
