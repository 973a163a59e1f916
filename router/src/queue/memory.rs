//! In-memory broker backend
//!
//! Topics are created on first use and buffer up to `capacity` payloads.
//! Each topic supports exactly one subscription (the pub/sub model this
//! mirrors scales by adding topics, not subscribers). A nacked message is
//! requeued on its topic for redelivery.
//!
//! This backend exists for single-process deployments and tests; a
//! managed broker replaces it behind the same `MessageConsumer` and
//! producer contracts.

use crate::error::QueueError;
use crate::queue::{AckHandle, MessageConsumer, RawMessage};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use ulid::Ulid;

/// Buffer between the broker forwarder and the worker pool. Small on
/// purpose: backpressure belongs on the topic, not in the consumer.
const FORWARD_BUFFER: usize = 32;

struct TopicState {
    tx: mpsc::Sender<Bytes>,
    // Taken by the first (only) subscriber
    rx: Option<mpsc::Receiver<Bytes>>,
}

/// A process-local broker with named, bounded topics
pub struct MemoryBroker {
    capacity: usize,
    topics: Mutex<HashMap<String, TopicState>>,
}

impl MemoryBroker {
    /// Create a broker whose topics buffer up to `capacity` payloads
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Publish a payload to a topic, creating the topic on first use.
    ///
    /// Publishing to a full topic is an error; the caller decides whether
    /// that surfaces as HTTP 500 or a nack.
    pub fn publish(&self, topic: &str, payload: Bytes) -> Result<(), QueueError> {
        let tx = {
            let mut topics = self.topics.lock();
            self.topic_entry(&mut topics, topic).tx.clone()
        };
        tx.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => QueueError::Full {
                topic: topic.to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed {
                topic: topic.to_string(),
            },
        })
    }

    /// Attach the single subscription for a topic, creating the topic if
    /// it does not exist yet. Payloads published before subscription are
    /// buffered and delivered.
    pub fn subscribe(&self, topic: &str) -> Result<MemorySubscription, QueueError> {
        let mut topics = self.topics.lock();
        let state = self.topic_entry(&mut topics, topic);
        let rx = state.rx.take().ok_or_else(|| QueueError::AlreadySubscribed {
            topic: topic.to_string(),
        })?;
        Ok(MemorySubscription {
            topic: topic.to_string(),
            requeue: state.tx.clone(),
            rx,
        })
    }

    fn topic_entry<'a>(
        &self,
        topics: &'a mut HashMap<String, TopicState>,
        topic: &str,
    ) -> &'a mut TopicState {
        topics.entry(topic.to_string()).or_insert_with(|| {
            debug!(topic = %topic, "creating topic");
            let (tx, rx) = mpsc::channel(self.capacity);
            TopicState { tx, rx: Some(rx) }
        })
    }
}

/// The receiving half of a topic
pub struct MemorySubscription {
    topic: String,
    requeue: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
}

impl MemorySubscription {
    /// Receive the next payload. `None` once the topic has no senders left.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// `MessageConsumer` over a topic subscription
///
/// `start` moves the subscription into a forwarder task that wraps each
/// payload in a `RawMessage` whose nack requeues it on the topic.
pub struct MemoryConsumer {
    subscription: Mutex<Option<MemorySubscription>>,
    stop: watch::Sender<bool>,
}

impl MemoryConsumer {
    pub fn new(subscription: MemorySubscription) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            subscription: Mutex::new(Some(subscription)),
            stop,
        }
    }
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    async fn start(&self) -> Result<mpsc::Receiver<RawMessage>, QueueError> {
        let mut subscription = self
            .subscription
            .lock()
            .take()
            .ok_or(QueueError::AlreadyStarted)?;
        let mut stop_rx = self.stop.subscribe();
        let (tx, rx) = mpsc::channel(FORWARD_BUFFER);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    payload = subscription.recv() => {
                        let Some(payload) = payload else { break };
                        let msg = RawMessage::new(
                            Ulid::new().to_string(),
                            payload.clone(),
                            Box::new(MemoryAck {
                                requeue: subscription.requeue.clone(),
                                payload,
                            }),
                        );
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(topic = %subscription.topic(), "consumer forwarder stopped");
        });

        Ok(rx)
    }

    async fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

struct MemoryAck {
    requeue: mpsc::Sender<Bytes>,
    payload: Bytes,
}

#[async_trait]
impl AckHandle for MemoryAck {
    async fn ack(self: Box<Self>) {}

    async fn nack(self: Box<Self>) {
        if self.requeue.send(self.payload).await.is_err() {
            warn!("redelivery channel closed, nacked message lost");
        }
    }
}
