//! # Broker Connector
//!
//! Owns the broker connection lifecycle: bounded connect retry, idempotent
//! declaration of the well-known queues, the publish/subscribe primitives the
//! worker uses, and scoped shutdown.
//!
//! State transitions:
//!
//! ```text
//! Disconnected -> Connecting -> Connected | Failed
//! Connected    -> Disconnected   (close() or broker-side close)
//! ```
//!
//! There is no automatic reconnection once startup has succeeded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::traits::{BrokerChannel, ChannelFactory};
use super::types::{AckMode, ConnectionState, DeliveryStream, QueueSpec};
use super::{MessagingError, MessagingResult};
use crate::constants::queues::{DOCUMENT_QUEUE, OCR_RESULT_QUEUE};
use crate::resilience::{retry_with_delay, RetryError, RetryPolicy};

/// Establishes broker connections with bounded retry
pub struct BrokerConnector {
    factory: Arc<dyn ChannelFactory>,
    queues: Vec<QueueSpec>,
    policy: RetryPolicy,
    state: Arc<RwLock<ConnectionState>>,
}

impl std::fmt::Debug for BrokerConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConnector")
            .field("endpoint", &self.factory.endpoint())
            .field("queues", &self.queues)
            .field("policy", &self.policy)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl BrokerConnector {
    /// Create a connector that declares `document_queue` and `ocr_result_queue`
    pub fn new(factory: Arc<dyn ChannelFactory>, policy: RetryPolicy) -> Self {
        Self {
            factory,
            queues: vec![
                QueueSpec::transient(DOCUMENT_QUEUE),
                QueueSpec::transient(OCR_RESULT_QUEUE),
            ],
            policy,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    /// Replace the set of queues declared after each successful connect
    pub fn with_queues(mut self, queues: Vec<QueueSpec>) -> Self {
        self.queues = queues;
        self
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Connect with bounded retry and declare the queues
    ///
    /// Each attempt opens a fresh connection and channel. If every attempt
    /// fails, or the connection is not open once declared, the state becomes
    /// `Failed` and a fatal error is returned; callers must not subscribe.
    pub async fn connect(
        &self,
        shutdown: Option<&mut broadcast::Receiver<()>>,
    ) -> MessagingResult<BrokerConnection> {
        self.set_state(ConnectionState::Connecting);

        info!(
            endpoint = %self.factory.endpoint(),
            max_attempts = self.policy.max_attempts,
            retry_delay_ms = self.policy.delay.as_millis() as u64,
            "Connecting to message broker"
        );

        let result = retry_with_delay("broker_connect", &self.policy, shutdown, |attempt| {
            self.open_and_declare(attempt)
        })
        .await;

        let channel = match result {
            Ok(channel) => channel,
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                self.set_state(ConnectionState::Failed);
                error!(
                    endpoint = %self.factory.endpoint(),
                    attempts = attempts,
                    error = %last_error,
                    "Failed to connect to message broker after multiple attempts"
                );
                return Err(MessagingError::connection_exhausted(
                    attempts,
                    last_error.to_string(),
                ));
            }
            Err(RetryError::Cancelled { attempts }) => {
                self.set_state(ConnectionState::Failed);
                warn!(attempts = attempts, "Broker connect cancelled by shutdown");
                return Err(MessagingError::cancelled("broker_connect"));
            }
        };

        if !channel.is_open() {
            self.set_state(ConnectionState::Failed);
            error!(
                endpoint = %self.factory.endpoint(),
                "Broker connection is not open after connect"
            );
            if let Err(close_err) = channel.close().await {
                debug!(error = %close_err, "Ignoring close failure on discarded connection");
            }
            return Err(MessagingError::NotConnected);
        }

        self.set_state(ConnectionState::Connected);
        info!(
            provider = channel.provider_name(),
            queues = ?self.queues.iter().map(|q| q.name.as_str()).collect::<Vec<_>>(),
            "Successfully connected to message broker and queues declared"
        );

        Ok(BrokerConnection {
            channel,
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        })
    }

    async fn open_and_declare(&self, attempt: u32) -> MessagingResult<Arc<dyn BrokerChannel>> {
        let channel = self.factory.open().await?;

        for spec in &self.queues {
            if let Err(e) = channel.declare_queue(spec).await {
                debug!(
                    attempt = attempt,
                    queue = %spec.name,
                    "Queue declaration failed, discarding this connection"
                );
                if let Err(close_err) = channel.close().await {
                    debug!(error = %close_err, "Ignoring close failure on discarded connection");
                }
                return Err(e);
            }
        }

        Ok(channel)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write();
        if *state != next {
            debug!(from = %*state, to = %next, "Broker connection state change");
            *state = next;
        }
    }
}

/// A live broker connection with its single channel
///
/// Shared by the consumer loop and the result publisher. `close()` is
/// idempotent and is expected on every shutdown path.
pub struct BrokerConnection {
    channel: Arc<dyn BrokerChannel>,
    state: Arc<RwLock<ConnectionState>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for BrokerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("provider", &self.channel.provider_name())
            .field("state", &*self.state.read())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl BrokerConnection {
    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the connection is usable
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.channel.is_open()
    }

    /// Declare a queue on the live channel (idempotent for an identical spec)
    pub async fn declare_queue(&self, spec: &QueueSpec) -> MessagingResult<()> {
        self.ensure_open()?;
        self.channel.declare_queue(spec).await
    }

    /// Fire-and-forget publish to `queue_name`
    pub async fn publish(&self, queue_name: &str, payload: &[u8]) -> MessagingResult<()> {
        self.ensure_open()?;
        self.channel.publish(queue_name, payload).await
    }

    /// Register a consumer on `queue_name`
    pub async fn subscribe(
        &self,
        queue_name: &str,
        consumer_tag: &str,
        ack_mode: AckMode,
    ) -> MessagingResult<DeliveryStream> {
        self.ensure_open()?;
        info!(
            queue = %queue_name,
            consumer_tag = %consumer_tag,
            ack_mode = ?ack_mode,
            "Subscribing to queue"
        );
        self.channel
            .subscribe(queue_name, consumer_tag, ack_mode.broker_acks_on_delivery())
            .await
    }

    /// Acknowledge a delivery received on a manual-ack consumer
    pub async fn ack(&self, queue_name: &str, delivery_tag: u64) -> MessagingResult<()> {
        self.ensure_open()?;
        self.channel.ack(queue_name, delivery_tag).await
    }

    /// Record that the broker closed the connection from its side
    pub fn mark_disconnected(&self) {
        let mut state = self.state.write();
        if *state == ConnectionState::Connected {
            warn!("Broker closed the connection");
            *state = ConnectionState::Disconnected;
        }
    }

    /// Close the channel, then the connection
    ///
    /// A second call is a no-op, and a connection the broker already closed
    /// is not reported as an error.
    pub async fn close(&self) -> MessagingResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Broker connection already closed");
            return Ok(());
        }

        let result = self.channel.close().await;
        *self.state.write() = ConnectionState::Disconnected;

        match &result {
            Ok(()) => info!("Broker connection closed"),
            Err(e) => warn!(error = %e, "Broker connection closed with error"),
        }
        result
    }

    fn ensure_open(&self) -> MessagingResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::NotConnected);
        }
        Ok(())
    }
}
