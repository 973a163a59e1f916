//! The envelope is the opaque unit the service routes
//!
//! The cryptographic payload is never inspected here: `encrypted_data`,
//! `encrypted_symmetric_key`, and `signature` are carried as raw bytes
//! and base64-encoded on the wire. Routing only reads the two URNs and
//! `message_id`.
//!
//! # Wire form
//!
//! ```json
//! {
//!   "messageId": "01J0...",
//!   "senderId": "urn:sm:user:alice",
//!   "recipientId": "user-bob",
//!   "encryptedData": "aGVsbG8=",
//!   "encryptedSymmetricKey": "a2V5",
//!   "signature": "c2ln"
//! }
//! ```
//!
//! `senderId` and `recipientId` accept either a full URN or a bare legacy
//! id. Every field is defaultable on decode; validation happens in the
//! transformer and the HTTP handlers, not in serde.

use crate::urn::Urn;
use serde::{Deserialize, Serialize};

/// An opaque end-to-end-encrypted message unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecureEnvelope {
    /// Globally unique id; assigned by the store if the sender omitted it
    pub message_id: String,

    /// Sender identity; must be non-zero after ingest validation
    pub sender_id: Urn,

    /// Recipient identity; the routing key
    pub recipient_id: Urn,

    /// Ciphertext, opaque to the router
    #[serde(with = "base64_bytes")]
    pub encrypted_data: Vec<u8>,

    /// Wrapped symmetric key, opaque to the router
    #[serde(with = "base64_bytes")]
    pub encrypted_symmetric_key: Vec<u8>,

    /// Sender signature over the ciphertext, opaque to the router
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

/// Base64 (standard alphabet) encoding for opaque byte fields
pub mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
