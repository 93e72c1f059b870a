//! # In-Memory Broker
//!
//! Thread-safe in-memory broker for testing and local development.
//!
//! ## Features
//!
//! - **Queue declarations**: identical redeclaration is a no-op, a mismatched
//!   one fails like RabbitMQ's `PRECONDITION_FAILED`
//! - **Push consumers**: deliveries are pushed over an unbounded channel
//! - **Manual acks**: unacked deliveries are requeued as redelivered when their
//!   channel closes
//! - **Fault scripting**: failed connects, failed declarations, failed
//!   publishes, connections that drop after opening, and broker-side close

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc;
use parking_lot::Mutex;
use tracing::debug;

use crate::messaging::traits::{BrokerChannel, ChannelFactory};
use crate::messaging::types::{Delivery, DeliveryStream, QueueSpec};
use crate::messaging::MessagingError;

type DeliverySender = mpsc::UnboundedSender<Result<Delivery, MessagingError>>;

#[derive(Debug)]
struct Consumer {
    channel_id: u64,
    no_ack: bool,
    sender: DeliverySender,
}

#[derive(Debug)]
struct InMemoryQueue {
    spec: QueueSpec,
    /// Messages waiting for a consumer
    ready: VecDeque<(Vec<u8>, bool)>,
    /// Every body ever routed to this queue, in order
    history: Vec<Vec<u8>>,
    /// delivery_tag -> (channel_id, body) for manual-ack deliveries
    unacked: HashMap<u64, (u64, Vec<u8>)>,
    acked: Vec<u64>,
    consumer: Option<Consumer>,
}

impl InMemoryQueue {
    fn new(spec: QueueSpec) -> Self {
        Self {
            spec,
            ready: VecDeque::new(),
            history: Vec::new(),
            unacked: HashMap::new(),
            acked: Vec::new(),
            consumer: None,
        }
    }
}

#[derive(Debug, Default)]
struct BrokerInner {
    queues: HashMap<String, InMemoryQueue>,
    channels: HashMap<u64, Arc<AtomicBool>>,
    next_channel_id: u64,
    next_delivery_tag: u64,
    connect_attempts: u32,
    close_calls: u32,
    failing_connects: u32,
    failing_declarations: u32,
    drop_after_open: bool,
    fail_publishes: bool,
}

impl BrokerInner {
    /// Push ready messages to the consumer until it is gone or the queue is empty
    fn dispatch(&mut self, queue_name: &str) {
        let next_tag = &mut self.next_delivery_tag;
        let Some(queue) = self.queues.get_mut(queue_name) else {
            return;
        };

        while let Some(consumer) = queue.consumer.as_ref() {
            let Some((body, redelivered)) = queue.ready.pop_front() else {
                break;
            };
            *next_tag += 1;
            let delivery = Delivery {
                delivery_tag: *next_tag,
                body: body.clone(),
                redelivered,
            };

            if consumer.sender.unbounded_send(Ok(delivery)).is_err() {
                // Receiver dropped; keep the message for the next consumer.
                queue.ready.push_front((body, redelivered));
                queue.consumer = None;
                break;
            }
            if !consumer.no_ack {
                queue.unacked.insert(*next_tag, (consumer.channel_id, body));
            }
        }
    }

    /// Drop the channel's consumers and requeue its unacked deliveries
    fn release_channel(&mut self, channel_id: u64) {
        if let Some(open) = self.channels.remove(&channel_id) {
            open.store(false, Ordering::Release);
        }

        let mut touched = Vec::new();
        for (name, queue) in self.queues.iter_mut() {
            if queue
                .consumer
                .as_ref()
                .is_some_and(|c| c.channel_id == channel_id)
            {
                queue.consumer = None;
            }

            let mut requeue: Vec<(u64, Vec<u8>)> = queue
                .unacked
                .iter()
                .filter(|(_, (owner, _))| *owner == channel_id)
                .map(|(tag, (_, body))| (*tag, body.clone()))
                .collect();
            requeue.sort_by_key(|(tag, _)| *tag);
            for (tag, body) in requeue.into_iter().rev() {
                queue.unacked.remove(&tag);
                queue.ready.push_front((body, true));
            }
            touched.push(name.clone());
        }

        for name in touched {
            self.dispatch(&name);
        }
    }
}

/// In-memory broker implementing [`ChannelFactory`]
///
/// Cloning shares the same broker, so a test can keep a handle for scripting
/// and inspection while the worker owns another.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ocr_worker::messaging::providers::InMemoryBroker;
/// use ocr_worker::messaging::BrokerConnector;
/// use ocr_worker::resilience::RetryPolicy;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = InMemoryBroker::new();
/// let connector = BrokerConnector::new(Arc::new(broker.clone()), RetryPolicy::default());
/// let connection = connector.connect(None).await?;
///
/// broker.inject("document_queue", b"42|uploads/report.pdf")?;
/// connection.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Mutex<BrokerInner>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` connection attempts fail
    pub fn fail_next_connects(&self, count: u32) {
        self.inner.lock().failing_connects = count;
    }

    /// Make the next `count` queue declarations fail
    pub fn fail_next_declarations(&self, count: u32) {
        self.inner.lock().failing_declarations = count;
    }

    /// Channels opened from now on report themselves closed
    pub fn drop_connections_after_open(&self, enabled: bool) {
        self.inner.lock().drop_after_open = enabled;
    }

    /// Make every publish fail while enabled
    pub fn fail_publishes(&self, enabled: bool) {
        self.inner.lock().fail_publishes = enabled;
    }

    /// Number of connection attempts seen, successful or not
    pub fn connect_attempts(&self) -> u32 {
        self.inner.lock().connect_attempts
    }

    /// Number of client-initiated channel closes
    pub fn close_calls(&self) -> u32 {
        self.inner.lock().close_calls
    }

    /// Number of channels currently open
    pub fn open_channels(&self) -> usize {
        self.inner
            .lock()
            .channels
            .values()
            .filter(|open| open.load(Ordering::Acquire))
            .count()
    }

    pub fn queue_exists(&self, queue_name: &str) -> bool {
        self.inner.lock().queues.contains_key(queue_name)
    }

    pub fn declared_spec(&self, queue_name: &str) -> Option<QueueSpec> {
        self.inner
            .lock()
            .queues
            .get(queue_name)
            .map(|q| q.spec.clone())
    }

    /// Publish as an external producer would
    pub fn inject(&self, queue_name: &str, body: &[u8]) -> Result<(), MessagingError> {
        let mut inner = self.inner.lock();
        route(&mut inner, queue_name, body)
    }

    /// Every body routed to `queue_name`, consumed or not
    pub fn published(&self, queue_name: &str) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .queues
            .get(queue_name)
            .map(|q| q.history.clone())
            .unwrap_or_default()
    }

    /// Messages waiting in `queue_name` for a consumer
    pub fn ready_count(&self, queue_name: &str) -> usize {
        self.inner
            .lock()
            .queues
            .get(queue_name)
            .map(|q| q.ready.len())
            .unwrap_or(0)
    }

    /// Manual-ack deliveries not yet acknowledged
    pub fn unacked_count(&self, queue_name: &str) -> usize {
        self.inner
            .lock()
            .queues
            .get(queue_name)
            .map(|q| q.unacked.len())
            .unwrap_or(0)
    }

    pub fn acked(&self, queue_name: &str) -> Vec<u64> {
        self.inner
            .lock()
            .queues
            .get(queue_name)
            .map(|q| q.acked.clone())
            .unwrap_or_default()
    }

    pub fn has_consumer(&self, queue_name: &str) -> bool {
        self.inner
            .lock()
            .queues
            .get(queue_name)
            .is_some_and(|q| q.consumer.is_some())
    }

    /// Close every open channel from the broker side
    ///
    /// Consumer streams end, and channels report closed.
    pub fn close_from_server(&self) {
        let mut inner = self.inner.lock();
        let ids: Vec<u64> = inner.channels.keys().copied().collect();
        debug!(channels = ids.len(), "In-memory broker closing all channels");
        for id in ids {
            inner.release_channel(id);
        }
    }
}

fn route(inner: &mut BrokerInner, queue_name: &str, body: &[u8]) -> Result<(), MessagingError> {
    let Some(queue) = inner.queues.get_mut(queue_name) else {
        // Default exchange drops messages for unknown routing keys
        debug!(queue = %queue_name, "Dropping message for undeclared queue");
        return Ok(());
    };
    queue.history.push(body.to_vec());
    queue.ready.push_back((body.to_vec(), false));
    inner.dispatch(queue_name);
    Ok(())
}

#[async_trait]
impl ChannelFactory for InMemoryBroker {
    async fn open(&self) -> Result<Arc<dyn BrokerChannel>, MessagingError> {
        let mut inner = self.inner.lock();
        inner.connect_attempts += 1;

        if inner.failing_connects > 0 {
            inner.failing_connects -= 1;
            return Err(MessagingError::connection(
                "in-memory broker: connection refused",
            ));
        }

        inner.next_channel_id += 1;
        let id = inner.next_channel_id;
        let open = Arc::new(AtomicBool::new(true));
        inner.channels.insert(id, open.clone());

        Ok(Arc::new(InMemoryChannel {
            id,
            broker: self.clone(),
            open,
            report_closed: inner.drop_after_open,
        }))
    }

    fn endpoint(&self) -> String {
        "in-memory".to_string()
    }
}

/// Channel handed out by [`InMemoryBroker`]
#[derive(Debug)]
pub struct InMemoryChannel {
    id: u64,
    broker: InMemoryBroker,
    open: Arc<AtomicBool>,
    report_closed: bool,
}

impl InMemoryChannel {
    fn ensure_open(&self) -> Result<(), MessagingError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(MessagingError::NotConnected)
        }
    }
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), MessagingError> {
        self.ensure_open()?;
        let mut inner = self.broker.inner.lock();

        if inner.failing_declarations > 0 {
            inner.failing_declarations -= 1;
            return Err(MessagingError::queue_declaration(
                &spec.name,
                "in-memory broker: declaration rejected",
            ));
        }

        match inner.queues.get(&spec.name) {
            Some(existing) if existing.spec != *spec => Err(MessagingError::queue_declaration(
                &spec.name,
                format!(
                    "PRECONDITION_FAILED - inequivalent arg for queue '{}'",
                    spec.name
                ),
            )),
            Some(_) => Ok(()),
            None => {
                inner
                    .queues
                    .insert(spec.name.clone(), InMemoryQueue::new(spec.clone()));
                Ok(())
            }
        }
    }

    async fn publish(&self, queue_name: &str, payload: &[u8]) -> Result<(), MessagingError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(MessagingError::publish(queue_name, "channel is closed"));
        }
        let mut inner = self.broker.inner.lock();
        if inner.fail_publishes {
            return Err(MessagingError::publish(
                queue_name,
                "in-memory broker: publish rejected",
            ));
        }
        route(&mut inner, queue_name, payload)
    }

    async fn subscribe(
        &self,
        queue_name: &str,
        _consumer_tag: &str,
        no_ack: bool,
    ) -> Result<DeliveryStream, MessagingError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(MessagingError::subscribe(queue_name, "channel is closed"));
        }
        let mut inner = self.broker.inner.lock();
        let Some(queue) = inner.queues.get_mut(queue_name) else {
            return Err(MessagingError::subscribe(
                queue_name,
                format!("NOT_FOUND - no queue '{queue_name}'"),
            ));
        };

        let (sender, receiver) = mpsc::unbounded();
        queue.consumer = Some(Consumer {
            channel_id: self.id,
            no_ack,
            sender,
        });
        inner.dispatch(queue_name);

        Ok(Box::pin(receiver))
    }

    async fn ack(&self, queue_name: &str, delivery_tag: u64) -> Result<(), MessagingError> {
        self.ensure_open()?;
        let mut inner = self.broker.inner.lock();
        let queue = inner
            .queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::ack(queue_name, delivery_tag, "unknown queue"))?;

        match queue.unacked.remove(&delivery_tag) {
            Some(_) => {
                queue.acked.push(delivery_tag);
                Ok(())
            }
            None => Err(MessagingError::ack(
                queue_name,
                delivery_tag,
                "PRECONDITION_FAILED - unknown delivery tag",
            )),
        }
    }

    fn is_open(&self) -> bool {
        !self.report_closed && self.open.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), MessagingError> {
        let mut inner = self.broker.inner.lock();
        if self.open.load(Ordering::Acquire) {
            inner.close_calls += 1;
            inner.release_channel(self.id);
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
