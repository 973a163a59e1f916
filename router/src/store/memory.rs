//! In-memory message store backend
//!
//! One document map per recipient, one JSON document per envelope keyed
//! by `message_id`. Documents are held serialized, the way a document
//! store would hold them, so the retrieve path exercises the same
//! decode-and-skip behavior a real backend needs. Batch atomicity comes
//! from doing all serialization before taking the write lock.

use crate::envelope::SecureEnvelope;
use crate::error::ContractError;
use crate::store::MessageStore;
use crate::urn::Urn;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, error};
use ulid::Ulid;

/// Process-local `MessageStore` backend
pub struct MemoryMessageStore {
    recipients: RwLock<HashMap<Urn, HashMap<String, Vec<u8>>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self {
            recipients: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents currently held for a recipient
    pub fn count_for(&self, recipient: &Urn) -> usize {
        self.recipients
            .read()
            .get(recipient)
            .map_or(0, HashMap::len)
    }
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn store_messages(
        &self,
        recipient: &Urn,
        envelopes: &[SecureEnvelope],
    ) -> Result<(), ContractError> {
        if envelopes.is_empty() {
            return Ok(());
        }

        // Serialize the whole batch before touching the map: a failure
        // here leaves nothing visible.
        let mut documents = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            let mut envelope = envelope.clone();
            if envelope.message_id.is_empty() {
                envelope.message_id = Ulid::new().to_string();
                debug!(
                    message_id = %envelope.message_id,
                    recipient = %recipient,
                    "assigned message id to incoming envelope"
                );
            }
            let doc = serde_json::to_vec(&envelope)
                .map_err(|e| ContractError::Storage(format!("envelope serialization: {e}")))?;
            documents.push((envelope.message_id, doc));
        }

        let mut recipients = self.recipients.write();
        let messages = recipients.entry(recipient.clone()).or_default();
        for (id, doc) in documents {
            messages.insert(id, doc);
        }
        Ok(())
    }

    async fn retrieve_messages(&self, recipient: &Urn) -> Result<Vec<SecureEnvelope>, ContractError> {
        let recipients = self.recipients.read();
        let Some(messages) = recipients.get(recipient) else {
            return Ok(Vec::new());
        };

        let mut envelopes = Vec::with_capacity(messages.len());
        for (id, doc) in messages {
            match serde_json::from_slice(doc) {
                Ok(envelope) => envelopes.push(envelope),
                Err(e) => {
                    error!(
                        message_id = %id,
                        recipient = %recipient,
                        error = %e,
                        "failed to decode stored envelope, skipping"
                    );
                }
            }
        }
        Ok(envelopes)
    }

    async fn delete_messages(
        &self,
        recipient: &Urn,
        message_ids: &[String],
    ) -> Result<(), ContractError> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let mut recipients = self.recipients.write();
        if let Some(messages) = recipients.get_mut(recipient) {
            for id in message_ids {
                messages.remove(id);
            }
            if messages.is_empty() {
                recipients.remove(recipient);
            }
        }
        Ok(())
    }
}
