//! # xApp Runtime
//!
//! ## Startup Sequence
//!
//! 1. Restore persisted subscription records
//! 2. Wait for the fabric's route table (`ready_timeout_ms`)
//! 3. Start the dispatch loop, the subscription retry timer and the metrics
//!    reporter
//!
//! ## Shutdown Sequence
//!
//! 1. Signal every task
//! 2. The dispatch loop stops the transport, dispatches what was still
//!    queued and joins its workers
//! 3. Join the tasks (bounded by `SHUTDOWN_GRACE`)
//! 4. Publish final metrics

use crate::adapters::{NotificationBridge, RecordStore};
use crate::config::{ConfigError, XappConfig};
use crate::handlers::HealthCheckHandler;
use parking_lot::Mutex;
use shared_bus::InMemoryFabric;
use shared_types::message_types::RIC_HEALTH_CHECK_REQ;
use shared_types::TransportError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use xf_01_endpoint_registry::EndpointRegistry;
use xf_02_transport::{MessageTransport, Transport};
use xf_03_dispatch::{DispatchStats, DispatchStatsHandle, Dispatcher, HandlerTable};
use xf_04_subscriptions::{
    ClientError, HttpClientConfig, HttpSubscriptionClient, StoreError, SubscriptionClient,
    SubscriptionError, SubscriptionManager, SystemTimeSource,
};
use xf_telemetry::metrics::{self as gauges, gauge_value};

/// How long `shutdown` waits for each task.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Transport bound to the in-memory fabric.
pub type XappTransport = Transport<InMemoryFabric>;

/// Subscription manager as wired by the runtime.
pub type XappSubscriptions<C> = SubscriptionManager<C, RecordStore, SystemTimeSource>;

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Subscription store error: {0}")]
    Store(#[from] StoreError),

    #[error("Subscription client error: {0}")]
    Client(#[from] ClientError),

    #[error("Subscription service endpoint {0:?} is not registered")]
    ServiceUnresolved(String),

    #[error("Runtime already started")]
    AlreadyStarted,
}

/// One running xApp: transport, dispatch loop and subscription manager.
pub struct XappRuntime<C: SubscriptionClient + 'static = HttpSubscriptionClient> {
    config: XappConfig,
    fabric: Arc<InMemoryFabric>,
    registry: Arc<EndpointRegistry>,
    transport: Arc<XappTransport>,
    subscriptions: Arc<XappSubscriptions<C>>,
    /// Taken by `start`.
    handlers: Mutex<Option<HandlerTable>>,
    dispatch_stats: Mutex<Option<DispatchStatsHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl XappRuntime<HttpSubscriptionClient> {
    /// Build a runtime with its own fabric and an HTTP subscription client.
    ///
    /// The fabric is ready at once when the configuration carries routes;
    /// otherwise `start` waits for a route table to be loaded.
    pub fn new(config: XappConfig, handlers: HandlerTable) -> Result<Self, RuntimeError> {
        config.validate()?;
        let routes = config.route_table();
        let fabric = if routes.is_empty() {
            InMemoryFabric::new()
        } else {
            InMemoryFabric::with_routes(routes)
        };

        let registry = registry_with_service(&config);
        let base_url = resolve_service_url(&config, &registry)?;
        info!(base_url = %base_url, "Subscription service resolved");
        let client = HttpSubscriptionClient::new(config.http_client_config(base_url))?;

        Self::assemble(
            config,
            handlers,
            Arc::new(fabric),
            registry,
            Arc::new(client),
        )
    }
}

impl<C: SubscriptionClient + 'static> XappRuntime<C> {
    /// Build a runtime on a shared fabric with a caller-supplied client.
    pub fn with_parts(
        config: XappConfig,
        handlers: HandlerTable,
        fabric: Arc<InMemoryFabric>,
        client: Arc<C>,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;
        let registry = registry_with_service(&config);
        Self::assemble(config, handlers, fabric, registry, client)
    }

    fn assemble(
        config: XappConfig,
        handlers: HandlerTable,
        fabric: Arc<InMemoryFabric>,
        registry: Arc<EndpointRegistry>,
        client: Arc<C>,
    ) -> Result<Self, RuntimeError> {
        let transport = Arc::new(Transport::new(
            Arc::clone(&fabric),
            config.identity(),
            Arc::clone(&registry),
            config.transport_config(),
        ));

        let store = RecordStore::open(config.subscription.store_dir.as_deref())?;
        if !store.is_persistent() {
            warn!("No subscription store_dir configured, records will not survive a restart");
        }
        let subscriptions = Arc::new(SubscriptionManager::new(
            client,
            Arc::new(store),
            Arc::new(SystemTimeSource),
            config.subscription_config(),
        ));

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            fabric,
            registry,
            transport,
            subscriptions,
            handlers: Mutex::new(Some(handlers)),
            dispatch_stats: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
        })
    }

    /// Start the xApp. The runtime answers `RIC_HEALTH_CHECK_REQ` itself.
    ///
    /// # Errors
    /// - `AlreadyStarted` on a second call
    /// - `Transport(NotReady)` if no route table arrived in time
    /// - `Subscription` if persisted records cannot be read
    pub async fn start(&self) -> Result<(), RuntimeError> {
        let Some(handlers) = self.handlers.lock().take() else {
            return Err(RuntimeError::AlreadyStarted);
        };

        info!("===========================================");
        info!("  xApp Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("  Endpoint: {}", self.transport.identity());
        info!("===========================================");

        let restored = match self.subscriptions.restore() {
            Ok(restored) => restored,
            Err(e) => {
                *self.handlers.lock() = Some(handlers);
                return Err(e.into());
            }
        };
        if let Err(e) = self
            .transport
            .wait_until_ready(self.config.ready_timeout())
            .await
        {
            *self.handlers.lock() = Some(handlers);
            return Err(e.into());
        }

        let handlers = handlers.on(
            RIC_HEALTH_CHECK_REQ,
            Arc::new(HealthCheckHandler::new(Arc::clone(&self.transport))),
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.transport),
            Arc::new(handlers),
            Arc::new(NotificationBridge::new(Arc::clone(&self.subscriptions))),
            self.config.dispatch_config(),
        );
        *self.dispatch_stats.lock() = Some(dispatcher.counters());

        let mut tasks = Vec::with_capacity(3);

        let shutdown = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            dispatcher.run(shutdown).await;
        }));

        let manager = Arc::clone(&self.subscriptions);
        let shutdown = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            manager.run_timer(shutdown).await;
        }));

        tasks.push(self.spawn_metrics_reporter());
        self.tasks.lock().extend(tasks);

        info!(
            restored_subscriptions = restored,
            workers = self.config.dispatch.workers,
            "xApp started"
        );
        Ok(())
    }

    /// Stop sending, drain, close. Safe to call more than once, and
    /// before `start`.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Runtime task failed"),
                Err(_) => warn!(
                    grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
                    "Runtime task did not stop in time"
                ),
            }
        }

        // Covers the never-started case; a no-op after the dispatch loop
        // already did it.
        let leftover = self.transport.shutdown().await;
        if !leftover.is_empty() {
            warn!(count = leftover.len(), "Dropping messages queued after shutdown");
        }

        self.publish_metrics();
        info!("Shutdown complete");
    }

    /// Copy component stats into the Prometheus gauges.
    pub fn publish_metrics(&self) {
        let dispatch = self.dispatch_stats();
        publish(&self.transport, &self.subscriptions, dispatch);
    }

    fn spawn_metrics_reporter(&self) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let subscriptions = Arc::clone(&self.subscriptions);
        let dispatch = self.dispatch_stats.lock().clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        let period = self.config.metrics_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        publish(&transport, &subscriptions, dispatch.as_ref().map(DispatchStatsHandle::snapshot));
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    #[must_use]
    pub fn config(&self) -> &XappConfig {
        &self.config
    }

    #[must_use]
    pub fn fabric(&self) -> &Arc<InMemoryFabric> {
        &self.fabric
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<XappTransport> {
        &self.transport
    }

    #[must_use]
    pub fn subscriptions(&self) -> &Arc<XappSubscriptions<C>> {
        &self.subscriptions
    }

    /// Dispatch counters, once started.
    #[must_use]
    pub fn dispatch_stats(&self) -> Option<DispatchStats> {
        self.dispatch_stats
            .lock()
            .as_ref()
            .map(DispatchStatsHandle::snapshot)
    }
}

fn registry_with_service(config: &XappConfig) -> Arc<EndpointRegistry> {
    let registry = Arc::new(EndpointRegistry::new());
    registry.register(config.service_endpoint());
    registry
}

/// Explicit URL if configured, else the registry entry for the service
/// endpoint name.
fn resolve_service_url(
    config: &XappConfig,
    registry: &EndpointRegistry,
) -> Result<String, RuntimeError> {
    if let Some(url) = &config.subscription.service_url {
        return Ok(url.clone());
    }
    let name = &config.subscription.service_endpoint;
    registry
        .lookup_by_name(name)
        .map(|endpoint| HttpClientConfig::base_url_for(&endpoint))
        .ok_or_else(|| RuntimeError::ServiceUnresolved(name.clone()))
}

fn publish<C: SubscriptionClient>(
    transport: &XappTransport,
    subscriptions: &XappSubscriptions<C>,
    dispatch: Option<DispatchStats>,
) {
    let t = transport.stats();
    gauges::TRANSPORT_SENT.set(gauge_value(t.sent));
    gauges::TRANSPORT_RETRIED.set(gauge_value(t.retried));
    gauges::TRANSPORT_TRANSIENT_FAILURES.set(gauge_value(t.transient_failures));
    gauges::TRANSPORT_NO_ROUTE.set(gauge_value(t.no_route));
    gauges::TRANSPORT_RECEIVED.set(gauge_value(t.received));

    if let Some(d) = dispatch {
        gauges::DISPATCH_DISPATCHED.set(gauge_value(d.dispatched));
        gauges::DISPATCH_NOTIFICATIONS.set(gauge_value(d.notifications));
        gauges::DISPATCH_HANDLER_FAILURES.set(gauge_value(d.handler_failures));
    }

    let s = subscriptions.state_counts();
    gauges::SUBSCRIPTIONS_ACTIVE.set(s.active as i64);
    gauges::SUBSCRIPTIONS_PENDING.set((s.pending + s.delete_pending) as i64);
    gauges::SUBSCRIPTIONS_FAILED.set(s.failed as i64);
}
