//! # Worker Lifecycle
//!
//! `Starting -> Running -> Stopped`.
//!
//! `Starting` connects to the broker with bounded retry; a connect failure ends
//! the run with [`WorkerError::Startup`] before anything is subscribed.
//! `Running` pulls deliveries one at a time and hands each to the
//! [`DocumentProcessor`]; the next delivery is not pulled until the current one
//! is fully handled. Panics inside the handler are caught at the message
//! boundary.
//!
//! The run ends when a shutdown is requested (clean stop, the in-flight message
//! finishes first) or when the broker closes the consumer
//! ([`WorkerError::ConnectionLost`]). The connection is closed on every path
//! after a successful connect.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::processor::DocumentProcessor;
use super::stats::{WorkerStats, WorkerStatsSnapshot};
use crate::constants::broker::CONSUMER_TAG_PREFIX;
use crate::constants::queues::DOCUMENT_QUEUE;
use crate::error::{Result, WorkerError};
use crate::messaging::{AckMode, BrokerConnection, BrokerConnector, Delivery, MessagingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Starting,
    Running,
    Stopped,
}

/// Requests a graceful stop of a running [`WorkerLifecycle`]
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    shutdown_tx: broadcast::Sender<()>,
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Ask the worker to stop. Safe to call more than once, and before `run()`.
    pub fn shutdown(&self) {
        self.requested.store(true, Ordering::Release);
        // No receivers just means the worker is not running yet
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Consumer loop around the broker connection and the document processor
pub struct WorkerLifecycle {
    connector: BrokerConnector,
    processor: DocumentProcessor,
    inbound_queue: String,
    consumer_tag: String,
    ack_mode: AckMode,
    state: RwLock<LifecycleState>,
    shutdown: ShutdownHandle,
}

impl std::fmt::Debug for WorkerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLifecycle")
            .field("inbound_queue", &self.inbound_queue)
            .field("consumer_tag", &self.consumer_tag)
            .field("ack_mode", &self.ack_mode)
            .field("state", &*self.state.read())
            .field("connector", &self.connector)
            .finish()
    }
}

impl WorkerLifecycle {
    pub fn new(connector: BrokerConnector, processor: DocumentProcessor) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            connector,
            processor,
            inbound_queue: DOCUMENT_QUEUE.to_string(),
            consumer_tag: format!("{}-{}", CONSUMER_TAG_PREFIX, uuid::Uuid::new_v4()),
            ack_mode: AckMode::default(),
            state: RwLock::new(LifecycleState::Starting),
            shutdown: ShutdownHandle {
                shutdown_tx,
                requested: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn with_inbound_queue(mut self, queue: impl Into<String>) -> Self {
        self.inbound_queue = queue.into();
        self
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.processor.stats().clone()
    }

    /// Connect, subscribe and handle messages until shutdown or broker-side close
    pub async fn run(&self) -> Result<WorkerStatsSnapshot> {
        let mut shutdown_rx = self.shutdown.shutdown_tx.subscribe();
        self.set_state(LifecycleState::Starting);

        if self.shutdown.is_requested() {
            info!("Shutdown requested before startup, not connecting");
            self.set_state(LifecycleState::Stopped);
            return Ok(self.processor.stats().snapshot());
        }

        let connection = match self.connector.connect(Some(&mut shutdown_rx)).await {
            Ok(connection) => connection,
            Err(MessagingError::Cancelled { .. }) => {
                info!("Startup interrupted by shutdown");
                self.set_state(LifecycleState::Stopped);
                return Ok(self.processor.stats().snapshot());
            }
            Err(e) => {
                self.set_state(LifecycleState::Stopped);
                error!(error = %e, "Worker startup failed, not subscribing");
                return Err(WorkerError::startup(e));
            }
        };

        let result = self.consume(&connection, &mut shutdown_rx).await;

        if let Err(e) = connection.close().await {
            warn!(error = %e, "Error while closing broker connection");
        }
        self.set_state(LifecycleState::Stopped);

        let snapshot = self.processor.stats().snapshot();
        info!(
            received = snapshot.received,
            published = snapshot.published,
            rejected = snapshot.rejected,
            fetch_failures = snapshot.fetch_failures,
            empty_results = snapshot.empty_results,
            publish_failures = snapshot.publish_failures,
            panics = snapshot.panics,
            "OCR worker stopped"
        );

        result.map(|()| snapshot)
    }

    async fn consume(
        &self,
        connection: &BrokerConnection,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let mut deliveries = connection
            .subscribe(&self.inbound_queue, &self.consumer_tag, self.ack_mode)
            .await?;

        self.set_state(LifecycleState::Running);
        info!(
            queue = %self.inbound_queue,
            ack_mode = ?self.ack_mode,
            "OCR worker running, waiting for documents"
        );

        loop {
            if self.shutdown.is_requested() {
                info!("Shutdown requested, stopping consumer");
                return Ok(());
            }

            let next = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping consumer");
                    return Ok(());
                }
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => self.handle(connection, delivery).await,
                Some(Err(e)) => {
                    error!(queue = %self.inbound_queue, error = %e, "Delivery error");
                }
                None => {
                    connection.mark_disconnected();
                    error!(
                        queue = %self.inbound_queue,
                        "Consumer stream ended, broker connection lost"
                    );
                    return Err(WorkerError::connection_lost(&self.inbound_queue));
                }
            }
        }
    }

    async fn handle(&self, connection: &BrokerConnection, delivery: Delivery) {
        WorkerStats::incr(&self.processor.stats().received);
        debug!(
            delivery_tag = delivery.delivery_tag,
            redelivered = delivery.redelivered,
            bytes = delivery.body.len(),
            "Delivery received"
        );

        let handled = AssertUnwindSafe(self.processor.process(connection, &delivery.body))
            .catch_unwind()
            .await;

        if let Err(panic) = handled {
            WorkerStats::incr(&self.processor.stats().panics);
            error!(
                delivery_tag = delivery.delivery_tag,
                panic = %panic_message(panic.as_ref()),
                "Message handler panicked, continuing with next message"
            );
        }

        if !self.ack_mode.broker_acks_on_delivery() {
            if let Err(e) = connection
                .ack(&self.inbound_queue, delivery.delivery_tag)
                .await
            {
                error!(
                    delivery_tag = delivery.delivery_tag,
                    error = %e,
                    "Failed to acknowledge delivery"
                );
            }
        }
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.write();
        if *state != next {
            crate::log_worker!(debug, "lifecycle_transition", from: *state, to: next);
            *state = next;
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
