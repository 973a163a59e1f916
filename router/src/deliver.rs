//! Delivery producer: routing pipeline → per-edge-server topics
//!
//! Each edge server instance owns a `delivery-<instance>` topic and
//! forwards its contents to the live connections it holds. The router
//! publishes there when presence says the recipient is online.

use crate::envelope::SecureEnvelope;
use crate::error::ContractError;
use crate::queue::MemoryBroker;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Publishes an envelope to a named delivery topic
#[async_trait]
pub trait DeliveryProducer: Send + Sync {
    async fn publish(&self, topic: &str, envelope: &SecureEnvelope) -> Result<(), ContractError>;
}

/// Delivery producer over the in-memory broker
pub struct MemoryDeliveryProducer {
    broker: Arc<MemoryBroker>,
}

impl MemoryDeliveryProducer {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl DeliveryProducer for MemoryDeliveryProducer {
    async fn publish(&self, topic: &str, envelope: &SecureEnvelope) -> Result<(), ContractError> {
        let payload = serde_json::to_vec(envelope)
            .map_err(|e| ContractError::Publish(format!("envelope serialization: {e}")))?;
        self.broker
            .publish(topic, Bytes::from(payload))
            .map_err(|e| ContractError::Publish(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::urn::Urn;

    #[tokio::test]
    async fn test_publish_targets_named_topic() {
        let broker = Arc::new(MemoryBroker::new(8));
        let mut pod_a = broker.subscribe("delivery-pod-a").unwrap();
        let producer = MemoryDeliveryProducer::new(Arc::clone(&broker));

        let envelope = SecureEnvelope {
            message_id: "msg-1".into(),
            recipient_id: Urn::user("bob").unwrap(),
            ..Default::default()
        };
        producer.publish("delivery-pod-a", &envelope).await.unwrap();

        let payload = pod_a.recv().await.unwrap();
        let decoded: SecureEnvelope = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded.message_id, "msg-1");
    }
}
