//! In-process broker
//!
//! Queues live in memory. Each connection is its own channel with delivery
//! tags starting at 0. A consumer holds at most `prefetch_count` unacknowledged
//! deliveries; the rest stay ready until acknowledgments free the window.
//! Unacknowledged deliveries go back to the front of their queue, flagged as
//! redelivered, when the connection closes.

use crate::config::models::ConnectionOptions;
use crate::core::traits::{BrokerConnection, ConnectionFactory, DeliveryStream};
use crate::core::types::Delivery;
use crate::utils::error::{ConsumerError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};

type DeliverySender = mpsc::UnboundedSender<Result<Delivery>>;

/// Broker that keeps queues in memory
///
/// Cloning is cheap; clones share the same queues.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerState>,
}

#[derive(Default)]
struct BrokerState {
    queues: Mutex<HashMap<String, QueueState>>,
    fail_open: AtomicBool,
    fail_acks: AtomicBool,
    next_connection_id: AtomicU64,
    open_connections: AtomicU64,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Message>,
    consumer: Option<ConsumerSlot>,
    unacked: usize,
    acknowledged: Vec<u64>,
}

struct ConsumerSlot {
    channel: Arc<ChannelState>,
    consumer_tag: String,
    sender: DeliverySender,
    /// 0 means unlimited
    prefetch_count: u16,
    in_flight: usize,
}

impl ConsumerSlot {
    fn has_capacity(&self) -> bool {
        self.prefetch_count == 0 || self.in_flight < usize::from(self.prefetch_count)
    }
}

#[derive(Debug, Clone)]
struct Message {
    exchange: String,
    routing_key: String,
    body: Bytes,
    redelivered: bool,
}

/// Per-connection channel state
struct ChannelState {
    id: u64,
    open: AtomicBool,
    next_tag: AtomicU64,
    unacked: Mutex<BTreeMap<u64, (String, Message)>>,
}

impl ChannelState {
    fn new(id: u64) -> Self {
        Self {
            id,
            open: AtomicBool::new(true),
            next_tag: AtomicU64::new(0),
            unacked: Mutex::new(BTreeMap::new()),
        }
    }
}

impl QueueState {
    /// Push ready messages to the registered consumer, up to its prefetch window
    fn dispatch(&mut self, queue_name: &str) {
        let Some(slot) = self.consumer.as_mut() else {
            return;
        };

        while slot.has_capacity() {
            let Some(message) = self.ready.pop_front() else {
                break;
            };
            let tag = slot.channel.next_tag.fetch_add(1, Ordering::SeqCst);
            let delivery = Delivery::new(tag, message.body.clone())
                .with_routing(message.exchange.clone(), message.routing_key.clone())
                .with_consumer_tag(slot.consumer_tag.clone())
                .redelivered(message.redelivered);

            slot.channel
                .unacked
                .lock()
                .insert(tag, (queue_name.to_string(), message.clone()));

            if slot.sender.send(Ok(delivery)).is_err() {
                slot.channel.unacked.lock().remove(&tag);
                self.ready.push_front(message);
                self.consumer = None;
                debug!(queue = queue_name, "Consumer went away, keeping messages ready");
                return;
            }

            slot.in_flight += 1;
            self.unacked += 1;
            trace!(queue = queue_name, delivery_tag = tag, "Delivered message");
        }
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a queue; publishing declares implicitly
    pub fn declare_queue(&self, queue_name: &str) {
        self.inner
            .queues
            .lock()
            .entry(queue_name.to_string())
            .or_default();
    }

    /// Publish through the default exchange, routed by queue name
    pub fn publish(&self, queue_name: &str, body: impl Into<Bytes>) {
        self.publish_routed(queue_name, "", queue_name, body);
    }

    /// Publish with explicit exchange and routing key metadata
    pub fn publish_routed(
        &self,
        queue_name: &str,
        exchange: &str,
        routing_key: &str,
        body: impl Into<Bytes>,
    ) {
        let mut queues = self.inner.queues.lock();
        let queue = queues.entry(queue_name.to_string()).or_default();
        queue.ready.push_back(Message {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.into(),
            redelivered: false,
        });
        queue.dispatch(queue_name);
    }

    /// Publish a value serialized as JSON
    pub fn publish_json<T: Serialize>(&self, queue_name: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value)?;
        self.publish(queue_name, body);
        Ok(())
    }

    /// Delivery tags acknowledged on a queue, in acknowledgment order
    pub fn acknowledged(&self, queue_name: &str) -> Vec<u64> {
        self.inner
            .queues
            .lock()
            .get(queue_name)
            .map(|q| q.acknowledged.clone())
            .unwrap_or_default()
    }

    /// Messages waiting for a consumer
    pub fn ready_count(&self, queue_name: &str) -> usize {
        self.inner
            .queues
            .lock()
            .get(queue_name)
            .map_or(0, |q| q.ready.len())
    }

    /// Messages delivered but not yet acknowledged
    pub fn unacked_count(&self, queue_name: &str) -> usize {
        self.inner
            .queues
            .lock()
            .get(queue_name)
            .map_or(0, |q| q.unacked)
    }

    pub fn has_consumer(&self, queue_name: &str) -> bool {
        self.inner
            .queues
            .lock()
            .get(queue_name)
            .is_some_and(|q| q.consumer.is_some())
    }

    pub fn open_connections(&self) -> u64 {
        self.inner.open_connections.load(Ordering::SeqCst)
    }

    /// Make subsequent `open_connection` calls fail
    pub fn set_fail_open(&self, fail: bool) {
        self.inner.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent acknowledgments fail with a connection fault
    pub fn set_fail_acks(&self, fail: bool) {
        self.inner.fail_acks.store(fail, Ordering::SeqCst);
    }

    /// Push a connection fault into the delivery stream of the queue's consumer
    pub fn inject_fault(&self, queue_name: &str, reason: &str) -> bool {
        let queues = self.inner.queues.lock();
        queues
            .get(queue_name)
            .and_then(|q| q.consumer.as_ref())
            .is_some_and(|slot| {
                slot.sender
                    .send(Err(ConsumerError::connection_fault(reason.to_string())))
                    .is_ok()
            })
    }

    /// Cancel the queue's consumer from the broker side; its stream ends
    pub fn cancel_consumer(&self, queue_name: &str) -> bool {
        let mut queues = self.inner.queues.lock();
        queues
            .get_mut(queue_name)
            .and_then(|q| q.consumer.take())
            .is_some()
    }
}

#[async_trait]
impl ConnectionFactory for InMemoryBroker {
    async fn open_connection(
        &self,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn BrokerConnection>> {
        if self.inner.fail_open.load(Ordering::SeqCst) {
            return Err(ConsumerError::connection_fault(format!(
                "connection to {} refused",
                options.display_uri()
            )));
        }

        let id = self.inner.next_connection_id.fetch_add(1, Ordering::SeqCst);
        self.inner.open_connections.fetch_add(1, Ordering::SeqCst);
        debug!(connection_id = id, uri = %options.display_uri(), "Opened in-memory connection");

        Ok(Arc::new(InMemoryConnection {
            broker: self.inner.clone(),
            channel: Arc::new(ChannelState::new(id)),
        }))
    }
}

/// Connection handed out by [`InMemoryBroker`]
pub struct InMemoryConnection {
    broker: Arc<BrokerState>,
    channel: Arc<ChannelState>,
}

impl InMemoryConnection {
    fn ensure_open(&self) -> Result<()> {
        if self.channel.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConsumerError::connection_fault(format!(
                "channel {} is closed",
                self.channel.id
            )))
        }
    }
}

#[async_trait]
impl BrokerConnection for InMemoryConnection {
    async fn create_consumer(
        &self,
        queue_name: &str,
        prefetch_count: u16,
        consumer_tag: &str,
    ) -> Result<DeliveryStream> {
        self.ensure_open()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        {
            let mut queues = self.broker.queues.lock();
            let queue = queues.entry(queue_name.to_string()).or_default();
            if queue.consumer.as_ref().is_some_and(|slot| !slot.sender.is_closed()) {
                return Err(ConsumerError::connection_fault(format!(
                    "queue '{}' already has an exclusive consumer",
                    queue_name
                )));
            }
            queue.consumer = Some(ConsumerSlot {
                channel: self.channel.clone(),
                consumer_tag: consumer_tag.to_string(),
                sender,
                prefetch_count,
                in_flight: 0,
            });
            queue.dispatch(queue_name);
        }

        debug!(
            queue = queue_name,
            prefetch_count,
            consumer_tag,
            "Registered in-memory consumer"
        );

        Ok(futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        })
        .boxed())
    }

    async fn acknowledge(&self, delivery_tag: u64, multiple: bool) -> Result<()> {
        self.ensure_open()?;
        if self.broker.fail_acks.load(Ordering::SeqCst) {
            return Err(ConsumerError::connection_fault(format!(
                "acknowledgment of delivery {} failed",
                delivery_tag
            )));
        }

        let acked: Vec<(u64, String)> = {
            let mut unacked = self.channel.unacked.lock();
            if multiple {
                let remaining = unacked.split_off(&delivery_tag.saturating_add(1));
                let taken = std::mem::replace(&mut *unacked, remaining);
                taken.into_iter().map(|(tag, (queue, _))| (tag, queue)).collect()
            } else {
                match unacked.remove(&delivery_tag) {
                    Some((queue, _)) => vec![(delivery_tag, queue)],
                    None => Vec::new(),
                }
            }
        };

        if acked.is_empty() {
            return Err(ConsumerError::connection_fault(format!(
                "unknown delivery tag {}",
                delivery_tag
            )));
        }

        let mut queues = self.broker.queues.lock();
        for (tag, queue_name) in acked {
            if let Some(queue) = queues.get_mut(&queue_name) {
                queue.unacked = queue.unacked.saturating_sub(1);
                queue.acknowledged.push(tag);
                if let Some(slot) = queue
                    .consumer
                    .as_mut()
                    .filter(|slot| slot.channel.id == self.channel.id)
                {
                    slot.in_flight = slot.in_flight.saturating_sub(1);
                }
                queue.dispatch(&queue_name);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.channel.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.broker.open_connections.fetch_sub(1, Ordering::SeqCst);

        let requeued = std::mem::take(&mut *self.channel.unacked.lock());
        let mut queues = self.broker.queues.lock();

        for queue in queues.values_mut() {
            if queue
                .consumer
                .as_ref()
                .is_some_and(|slot| slot.channel.id == self.channel.id)
            {
                queue.consumer = None;
            }
        }

        // Highest tag first so that push_front restores the original order.
        for (_, (queue_name, mut message)) in requeued.into_iter().rev() {
            if let Some(queue) = queues.get_mut(&queue_name) {
                message.redelivered = true;
                queue.unacked = queue.unacked.saturating_sub(1);
                queue.ready.push_front(message);
            }
        }

        debug!(connection_id = self.channel.id, "Closed in-memory connection");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.channel.open.load(Ordering::SeqCst)
    }
}
