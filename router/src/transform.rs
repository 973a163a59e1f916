//! Raw queue payload → validated envelope
//!
//! The transformer is total: every input yields either a validated
//! envelope or a `TransformError`. An error always means malformed input
//! and the orchestrator acks-and-drops it; retrying a payload that does
//! not decode cannot succeed.

use crate::envelope::SecureEnvelope;
use crate::error::TransformError;
use crate::queue::RawMessage;

/// Decode and validate a raw ingress message.
///
/// An envelope passes only with non-zero sender and recipient URNs.
pub fn transform(msg: &RawMessage) -> Result<SecureEnvelope, TransformError> {
    let envelope: SecureEnvelope =
        serde_json::from_slice(&msg.payload).map_err(|source| TransformError::Decode {
            message_id: msg.id.clone(),
            source,
        })?;

    if envelope.sender_id.is_zero() {
        return Err(TransformError::ZeroSender {
            message_id: msg.id.clone(),
        });
    }
    if envelope.recipient_id.is_zero() {
        return Err(TransformError::ZeroRecipient {
            message_id: msg.id.clone(),
        });
    }

    Ok(envelope)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::queue::NoopAck;
    use crate::urn::Urn;
    use bytes::Bytes;

    fn raw(payload: &str) -> RawMessage {
        RawMessage::new("delivery-1", Bytes::from(payload.to_string()), Box::new(NoopAck))
    }

    #[test]
    fn test_valid_envelope() {
        let envelope = transform(&raw(
            r#"{"messageId":"msg-1","senderId":"urn:sm:user:alice","recipientId":"user-bob"}"#,
        ))
        .unwrap();
        assert_eq!(envelope.message_id, "msg-1");
        assert_eq!(envelope.sender_id, Urn::user("alice").unwrap());
        assert_eq!(envelope.recipient_id, Urn::user("user-bob").unwrap());
    }

    #[test]
    fn test_malformed_json() {
        let err = transform(&raw("{not json")).unwrap_err();
        assert!(matches!(err, TransformError::Decode { .. }));
        assert!(err.to_string().contains("delivery-1"));
    }

    #[test]
    fn test_zero_sender_rejected() {
        let err = transform(&raw(r#"{"recipientId":"user-bob"}"#)).unwrap_err();
        assert!(matches!(err, TransformError::ZeroSender { .. }));
    }

    #[test]
    fn test_zero_recipient_rejected() {
        let err = transform(&raw(r#"{"senderId":"user-alice"}"#)).unwrap_err();
        assert!(matches!(err, TransformError::ZeroRecipient { .. }));
    }
}
