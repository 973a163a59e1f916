//! The routing decision
//!
//! Per envelope, two strategies in order:
//!
//! ```text
//! presence hit ──► publish to delivery-<instance> ──► Delivered
//!      │                       │
//!      │ miss                  │ failure ⇒ Err (nack, no fall-through)
//!      ▼
//! store envelope ──► fetch tokens ──► push notify ──► Stored
//!      │                  │               │
//!      │ failure ⇒ Err    │ miss ⇒ ok     │ failure ⇒ ok
//! ```
//!
//! The ordering inside strategy 2 is load-bearing: the envelope must be
//! durable before any push is attempted, and once it is durable nothing
//! after the store may fail the message (a retry would store it twice).
//! Likewise a failed live publish must not fall through to the store: the
//! broker redelivers and the next attempt decides fresh.

use crate::deliver::DeliveryProducer;
use crate::envelope::SecureEnvelope;
use crate::error::ProcessError;
use crate::notify::{DeviceToken, PushNotifier};
use crate::presence::{ConnectionInfo, Fetcher};
use crate::store::MessageStore;
use crate::urn::Urn;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Prefix of per-edge-server delivery topics
pub const DELIVERY_TOPIC_PREFIX: &str = "delivery-";

/// Terminal state of a routed envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarded live to the edge server holding the connection
    Delivered { topic: String },
    /// Parked in the offline store
    Stored { push: PushOutcome },
}

/// What happened to the wake-up after a successful store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Sent,
    /// No tokens registered, or the token lookup failed
    Skipped,
    /// Notifier failed; the envelope stays stored and the message is
    /// still acked
    Failed,
}

impl RouteOutcome {
    /// Stable label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            RouteOutcome::Delivered { .. } => "delivered",
            RouteOutcome::Stored {
                push: PushOutcome::Sent,
            } => "stored",
            RouteOutcome::Stored {
                push: PushOutcome::Skipped,
            } => "stored_no_push",
            RouteOutcome::Stored {
                push: PushOutcome::Failed,
            } => "stored_push_failed",
        }
    }
}

/// Presence-aware router for validated envelopes
///
/// Holds the five dependency contracts; wiring is immutable after
/// construction and shared across the worker pool.
pub struct RoutingProcessor {
    presence: Arc<dyn Fetcher<Urn, ConnectionInfo>>,
    device_tokens: Arc<dyn Fetcher<Urn, Vec<DeviceToken>>>,
    delivery: Arc<dyn DeliveryProducer>,
    notifier: Arc<dyn PushNotifier>,
    store: Arc<dyn MessageStore>,
}

impl RoutingProcessor {
    pub fn new(
        presence: Arc<dyn Fetcher<Urn, ConnectionInfo>>,
        device_tokens: Arc<dyn Fetcher<Urn, Vec<DeviceToken>>>,
        delivery: Arc<dyn DeliveryProducer>,
        notifier: Arc<dyn PushNotifier>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            presence,
            device_tokens,
            delivery,
            notifier,
            store,
        }
    }

    /// Route one envelope to its terminal state.
    ///
    /// `Err` is the nack signal: only a failed live publish or a failed
    /// store write produces one.
    pub async fn process(&self, envelope: &SecureEnvelope) -> Result<RouteOutcome, ProcessError> {
        let recipient = &envelope.recipient_id;

        // Strategy 1: live fan-out to the edge server holding the
        // recipient's connection.
        match self.presence.fetch(recipient).await {
            Ok(conn) => {
                let topic = format!("{DELIVERY_TOPIC_PREFIX}{}", conn.server_instance_id);
                debug!(recipient = %recipient, topic = %topic, "recipient online, forwarding");

                self.delivery
                    .publish(&topic, envelope)
                    .await
                    .map_err(|source| ProcessError::Delivery {
                        recipient: recipient.to_string(),
                        topic: topic.clone(),
                        source,
                    })?;
                return Ok(RouteOutcome::Delivered { topic });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                // Treated like a miss: the presence cache's only expected
                // error is a miss, and a routed-to-store message is still
                // delivered on the next poll.
                warn!(recipient = %recipient, error = %e, "presence lookup failed, treating recipient as offline");
            }
        }

        // Strategy 2: park the envelope, then try to wake the recipient.
        debug!(recipient = %recipient, "recipient offline, storing");
        self.store
            .store_messages(recipient, std::slice::from_ref(envelope))
            .await
            .map_err(|source| ProcessError::Store {
                recipient: recipient.to_string(),
                source,
            })?;

        let tokens = match self.device_tokens.fetch(recipient).await {
            Ok(tokens) if !tokens.is_empty() => tokens,
            Ok(_) => {
                warn!(recipient = %recipient, "no device tokens registered, skipping push");
                return Ok(RouteOutcome::Stored {
                    push: PushOutcome::Skipped,
                });
            }
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "device token lookup failed, skipping push");
                return Ok(RouteOutcome::Stored {
                    push: PushOutcome::Skipped,
                });
            }
        };

        match self.notifier.notify(&tokens, envelope).await {
            Ok(()) => Ok(RouteOutcome::Stored {
                push: PushOutcome::Sent,
            }),
            Err(e) => {
                // The envelope is durable; failing the message here would
                // re-store it on redelivery.
                error!(recipient = %recipient, error = %e, "push notification failed after store");
                Ok(RouteOutcome::Stored {
                    push: PushOutcome::Failed,
                })
            }
        }
    }
}
