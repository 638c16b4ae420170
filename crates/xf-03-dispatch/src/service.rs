//! Dispatch loop service.

use crate::domain::{DispatchConfig, DispatchCounters, DispatchStats, InboundMessage};
use crate::ports::outbound::{MessageHandler, NotificationSink};
use futures::FutureExt;
use shared_types::MessageEnvelope;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use xf_02_transport::{MessageTransport, ReceiveMode, Received};

/// The receive loop plus its handler workers.
pub struct Dispatcher<T: MessageTransport> {
    transport: Arc<T>,
    handler: Arc<dyn MessageHandler>,
    sink: Arc<dyn NotificationSink>,
    config: DispatchConfig,
    counters: Arc<DispatchCounters>,
}

impl<T: MessageTransport> Dispatcher<T> {
    pub fn new(
        transport: Arc<T>,
        handler: Arc<dyn MessageHandler>,
        sink: Arc<dyn NotificationSink>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            transport,
            handler,
            sink,
            config,
            counters: Arc::new(DispatchCounters::default()),
        }
    }

    /// Run until the transport closes or `shutdown` turns `true`.
    ///
    /// On shutdown the transport is shut down and whatever it still had
    /// queued is dispatched before the workers are joined.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> DispatchStats {
        let workers = self.config.workers.max(1);
        let mut queues = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let (tx, rx) = mpsc::channel(self.config.queue_depth.max(1));
            queues.push(tx);
            handles.push(self.spawn_worker(worker, rx));
        }
        info!(workers = workers, "Dispatch loop started");

        let poll = ReceiveMode::blocking_for(self.config.poll_interval);
        loop {
            if *shutdown.borrow() {
                self.drain_on_shutdown(&queues).await;
                break;
            }

            let received = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_ok() {
                        continue;
                    }
                    None
                }
                received = self.transport.receive(poll) => Some(received),
            };
            let Some(received) = received else {
                debug!("Shutdown sender dropped");
                self.drain_on_shutdown(&queues).await;
                break;
            };

            match received {
                Received::Message(envelope) => self.dispatch(envelope, &queues).await,
                Received::WouldBlock => {}
                Received::Closed => {
                    debug!("Transport closed");
                    break;
                }
            }
        }

        // Closing the queues lets every worker finish its backlog and exit.
        drop(queues);
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Dispatch worker aborted");
            }
        }

        let stats = self.counters.snapshot();
        info!(
            received = stats.received,
            dispatched = stats.dispatched,
            notifications = stats.notifications,
            handler_failures = stats.handler_failures,
            "Dispatch loop stopped"
        );
        stats
    }

    /// Current counters, usable while the loop runs.
    #[must_use]
    pub fn counters(&self) -> DispatchStatsHandle {
        DispatchStatsHandle {
            counters: Arc::clone(&self.counters),
        }
    }

    async fn drain_on_shutdown(&self, queues: &[mpsc::Sender<MessageEnvelope>]) {
        let drained = self.transport.shutdown().await;
        info!(queued = drained.len(), "Shutdown requested, dispatching queued messages");
        for envelope in drained {
            self.dispatch(envelope, queues).await;
        }
    }

    async fn dispatch(&self, envelope: MessageEnvelope, queues: &[mpsc::Sender<MessageEnvelope>]) {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        let message_type = envelope.message_type();

        match InboundMessage::classify(envelope) {
            Ok(InboundMessage::Notification(notification)) => {
                self.counters.notifications.fetch_add(1, Ordering::Relaxed);
                debug!(
                    kind = ?notification.kind,
                    local_id = notification.payload.local_id,
                    "Subscription notification"
                );
                self.sink.on_notification(notification).await;
            }
            Ok(InboundMessage::User(envelope)) => {
                let shard = self.config.shard_for(envelope.subscription_id());
                if let Some(queue) = queues.get(shard) {
                    if queue.send(envelope).await.is_err() {
                        warn!(worker = shard, "Dispatch worker gone, message dropped");
                    }
                }
            }
            Err(e) => {
                self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(message_type = message_type, error = %e, "Dropping malformed notification");
            }
        }
    }

    fn spawn_worker(
        &self,
        worker: usize,
        mut queue: mpsc::Receiver<MessageEnvelope>,
    ) -> JoinHandle<()> {
        let handler = Arc::clone(&self.handler);
        let transport = Arc::clone(&self.transport);
        let counters = Arc::clone(&self.counters);

        tokio::spawn(async move {
            while let Some(envelope) = queue.recv().await {
                counters.dispatched.fetch_add(1, Ordering::Relaxed);
                let outcome = AssertUnwindSafe(handler.handle(&envelope))
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            worker = worker,
                            message_type = envelope.message_type(),
                            subscription_id = envelope.subscription_id(),
                            error = %e,
                            "Handler failed"
                        );
                    }
                    Err(panic) => {
                        counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                        error!(
                            worker = worker,
                            message_type = envelope.message_type(),
                            subscription_id = envelope.subscription_id(),
                            panic = panic_message(&*panic),
                            "Handler panicked"
                        );
                    }
                }
                transport.recycle(envelope);
            }
            debug!(worker = worker, "Dispatch worker stopped");
        })
    }
}

/// Live view of a running dispatcher's counters.
#[derive(Clone)]
pub struct DispatchStatsHandle {
    counters: Arc<DispatchCounters>,
}

impl DispatchStatsHandle {
    #[must_use]
    pub fn snapshot(&self) -> DispatchStats {
        self.counters.snapshot()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
