//! Ingestion producer: HTTP surface → ingress topic
//!
//! The accept path serializes the envelope to JSON and hands it to the
//! durable queue; routing happens later, on the consumer side. Failures
//! propagate verbatim so the HTTP handler can answer 500.

use crate::envelope::SecureEnvelope;
use crate::error::ContractError;
use crate::queue::MemoryBroker;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Publishes an accepted envelope onto the ingress queue
#[async_trait]
pub trait IngestionProducer: Send + Sync {
    async fn publish(&self, envelope: &SecureEnvelope) -> Result<(), ContractError>;
}

/// Ingestion producer over the in-memory broker
pub struct MemoryIngestionProducer {
    broker: Arc<MemoryBroker>,
    topic: String,
}

impl MemoryIngestionProducer {
    pub fn new(broker: Arc<MemoryBroker>, topic: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl IngestionProducer for MemoryIngestionProducer {
    async fn publish(&self, envelope: &SecureEnvelope) -> Result<(), ContractError> {
        let payload = serde_json::to_vec(envelope)
            .map_err(|e| ContractError::Publish(format!("envelope serialization: {e}")))?;
        self.broker
            .publish(&self.topic, Bytes::from(payload))
            .map_err(|e| ContractError::Publish(e.to_string()))
    }
}
