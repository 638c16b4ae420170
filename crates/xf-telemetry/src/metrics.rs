//! Prometheus metrics for xApps.
//!
//! All metrics follow the naming convention: `xapp_<component>_<metric>`.
//!
//! Components keep their own atomic counters; the runtime copies snapshots
//! into these gauges periodically, so every value here is a gauge even when
//! the underlying count only grows.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // TRANSPORT METRICS
    // =========================================================================

    /// Messages accepted by the fabric
    pub static ref TRANSPORT_SENT: IntGauge = IntGauge::new(
        "xapp_transport_sent_total",
        "Messages accepted by the routing fabric"
    ).expect("metric creation failed");

    /// Send attempts repeated after a saturated mailbox
    pub static ref TRANSPORT_RETRIED: IntGauge = IntGauge::new(
        "xapp_transport_retried_total",
        "Send attempts repeated after a transient failure"
    ).expect("metric creation failed");

    /// Sends that stayed transient after every retry
    pub static ref TRANSPORT_TRANSIENT_FAILURES: IntGauge = IntGauge::new(
        "xapp_transport_transient_failures_total",
        "Sends abandoned after exhausting retries"
    ).expect("metric creation failed");

    /// Sends with no route
    pub static ref TRANSPORT_NO_ROUTE: IntGauge = IntGauge::new(
        "xapp_transport_no_route_total",
        "Sends with no route for the message type and subscription id"
    ).expect("metric creation failed");

    /// Messages received
    pub static ref TRANSPORT_RECEIVED: IntGauge = IntGauge::new(
        "xapp_transport_received_total",
        "Messages taken from the mailbox"
    ).expect("metric creation failed");

    // =========================================================================
    // DISPATCH METRICS
    // =========================================================================

    /// Messages handed to user handlers
    pub static ref DISPATCH_DISPATCHED: IntGauge = IntGauge::new(
        "xapp_dispatch_dispatched_total",
        "Messages handed to user handlers"
    ).expect("metric creation failed");

    /// Subscription notifications routed to the manager
    pub static ref DISPATCH_NOTIFICATIONS: IntGauge = IntGauge::new(
        "xapp_dispatch_notifications_total",
        "Subscription notifications routed to the subscription manager"
    ).expect("metric creation failed");

    /// Handler errors and panics
    pub static ref DISPATCH_HANDLER_FAILURES: IntGauge = IntGauge::new(
        "xapp_dispatch_handler_failures_total",
        "Handler invocations that returned an error or panicked"
    ).expect("metric creation failed");

    // =========================================================================
    // SUBSCRIPTION METRICS
    // =========================================================================

    /// Active subscriptions
    pub static ref SUBSCRIPTIONS_ACTIVE: IntGauge = IntGauge::new(
        "xapp_subscriptions_active",
        "Subscriptions confirmed by the subscription service"
    ).expect("metric creation failed");

    /// Subscriptions awaiting a create or delete confirmation
    pub static ref SUBSCRIPTIONS_PENDING: IntGauge = IntGauge::new(
        "xapp_subscriptions_pending",
        "Subscriptions awaiting a create or delete confirmation"
    ).expect("metric creation failed");

    /// Failed subscriptions still tracked
    pub static ref SUBSCRIPTIONS_FAILED: IntGauge = IntGauge::new(
        "xapp_subscriptions_failed",
        "Subscriptions that ended in the Failed state"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// # Errors
/// `MetricsInit` if a metric is already registered.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Transport
        Box::new(TRANSPORT_SENT.clone()),
        Box::new(TRANSPORT_RETRIED.clone()),
        Box::new(TRANSPORT_TRANSIENT_FAILURES.clone()),
        Box::new(TRANSPORT_NO_ROUTE.clone()),
        Box::new(TRANSPORT_RECEIVED.clone()),
        // Dispatch
        Box::new(DISPATCH_DISPATCHED.clone()),
        Box::new(DISPATCH_NOTIFICATIONS.clone()),
        Box::new(DISPATCH_HANDLER_FAILURES.clone()),
        // Subscriptions
        Box::new(SUBSCRIPTIONS_ACTIVE.clone()),
        Box::new(SUBSCRIPTIONS_PENDING.clone()),
        Box::new(SUBSCRIPTIONS_FAILED.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
///
/// # Errors
/// `MetricsInit` if encoding fails.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Saturating conversion for counters copied into gauges.
#[must_use]
pub fn gauge_value(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
