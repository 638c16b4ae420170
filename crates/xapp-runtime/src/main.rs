//! # xApp Runtime
//!
//! Runs an xApp with the built-in handlers only: health checks are
//! answered and every other message is logged.
//!
//! ```text
//! xapp-runtime [config.toml]
//! ```
//!
//! The config path may also come from `XAPP_CONFIG`. `XAPP_*` variables
//! override the file.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use xapp_runtime::handlers::LoggingHandler;
use xapp_runtime::{XappConfig, XappRuntime};
use xf_03_dispatch::HandlerTable;
use xf_telemetry::{init_logging, register_metrics, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_logging(&TelemetryConfig::from_env())
        .context("Failed to initialize logging")?;
    if let Err(e) = register_metrics() {
        warn!(error = %e, "Metrics unavailable");
    }

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("XAPP_CONFIG").ok())
        .map(PathBuf::from);
    let config = XappConfig::from_file_and_env(path.as_deref())
        .with_context(|| format!("Failed to load configuration from {path:?}"))?;

    let handlers = HandlerTable::new().otherwise(Arc::new(LoggingHandler));
    let runtime = XappRuntime::new(config, handlers).context("Failed to build runtime")?;
    runtime.start().await.context("Failed to start xApp")?;

    info!("xApp is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}
