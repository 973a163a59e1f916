//! Broker contracts for the ingress queue
//!
//! The pipeline consumes raw messages from a durable queue and controls
//! retries exclusively through ack/nack:
//!
//! ```text
//! HTTP ingest ──► ingress topic ──► MessageConsumer ──► worker pool
//!                                       │
//!                                       ├─ ack  ⇒ done forever
//!                                       └─ nack ⇒ broker redelivers
//! ```
//!
//! `RawMessage::id` is the broker's delivery id, not the message identity;
//! a redelivered payload gets a fresh one.

pub mod memory;

use crate::error::QueueError;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use tokio::sync::mpsc;

pub use memory::{MemoryBroker, MemoryConsumer, MemorySubscription};

/// A raw message pulled off the queue, with its settlement handle
pub struct RawMessage {
    /// Broker delivery id
    pub id: String,

    /// Opaque payload bytes
    pub payload: Bytes,

    handle: Box<dyn AckHandle>,
}

impl RawMessage {
    pub fn new(id: impl Into<String>, payload: Bytes, handle: Box<dyn AckHandle>) -> Self {
        Self {
            id: id.into(),
            payload,
            handle,
        }
    }

    /// Settle the message as done. The broker will never redeliver it.
    pub async fn ack(self) {
        self.handle.ack().await;
    }

    /// Return the message to the broker for redelivery.
    pub async fn nack(self) {
        self.handle.nack().await;
    }
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMessage")
            .field("id", &self.id)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Settlement behavior behind a `RawMessage`
#[async_trait]
pub trait AckHandle: Send {
    async fn ack(self: Box<Self>);
    async fn nack(self: Box<Self>);
}

/// Ack handle that settles nothing. Useful for tests and detached messages.
pub struct NoopAck;

#[async_trait]
impl AckHandle for NoopAck {
    async fn ack(self: Box<Self>) {}
    async fn nack(self: Box<Self>) {}
}

/// A source of raw messages with cooperative shutdown
///
/// `start` hands back the message channel; `stop` halts delivery of new
/// messages while already-delivered ones stay settleable, so in-flight
/// workers can drain.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    async fn start(&self) -> Result<mpsc::Receiver<RawMessage>, QueueError>;
    async fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_ack_settles() {
        let msg = RawMessage::new("d-1", Bytes::from_static(b"payload"), Box::new(NoopAck));
        assert_eq!(msg.payload.len(), 7);
        msg.ack().await;

        let msg = RawMessage::new("d-2", Bytes::new(), Box::new(NoopAck));
        msg.nack().await;
    }

    #[test]
    fn test_debug_omits_payload_bytes() {
        let msg = RawMessage::new("d-3", Bytes::from_static(b"secret"), Box::new(NoopAck));
        let repr = format!("{msg:?}");
        assert!(repr.contains("d-3"));
        assert!(!repr.contains("secret"));
    }
}
