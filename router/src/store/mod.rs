//! Offline message store contract
//!
//! Envelopes for offline recipients are parked here until the recipient
//! drains them through `GET /messages`. The contract is at-least-once:
//! drain-then-delete can expose a duplicate window, and clients de-dup on
//! `messageId`.

pub mod memory;

use crate::envelope::SecureEnvelope;
use crate::error::ContractError;
use crate::urn::Urn;
use async_trait::async_trait;

pub use memory::MemoryMessageStore;

/// Per-recipient persistence for routed-but-undelivered envelopes
///
/// # Guarantees
///
/// - `store_messages` then `retrieve_messages` for the same recipient
///   returns at least the stored batch (read-your-writes).
/// - A batch becomes visible all-or-nothing: a partial write is reported
///   as a failed batch and leaves nothing readable.
/// - `retrieve_messages` then `delete_messages` with the returned ids
///   removes them from future retrieves.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a batch under the recipient's namespace.
    ///
    /// Envelopes without a `message_id` are assigned one before
    /// persistence. An empty batch is a successful no-op. A repeated id
    /// overwrites the previous document (idempotent redelivery).
    async fn store_messages(
        &self,
        recipient: &Urn,
        envelopes: &[SecureEnvelope],
    ) -> Result<(), ContractError>;

    /// All currently persisted envelopes for the recipient, in
    /// unspecified order. An unknown recipient yields an empty vec, not
    /// an error. Documents that fail to decode are logged and skipped.
    async fn retrieve_messages(&self, recipient: &Urn) -> Result<Vec<SecureEnvelope>, ContractError>;

    /// Delete the listed ids atomically. An empty list is a successful
    /// no-op; unknown ids are silently tolerated, so the call is
    /// idempotent.
    async fn delete_messages(
        &self,
        recipient: &Urn,
        message_ids: &[String],
    ) -> Result<(), ContractError>;
}
