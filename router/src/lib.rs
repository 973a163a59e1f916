//! REITTI - presence-aware routing for encrypted message envelopes
//!
//! A stateless hop between senders and recipients in an
//! end-to-end-encrypted messaging product. Envelopes are opaque; only the
//! recipient URN and the presence cache decide where they go.
//!
//! # Pipeline
//!
//! ```text
//! POST /send ──► ingress topic ──► worker pool ──► presence lookup
//!                                                     │
//!                                   ┌─────────────────┴──────────────┐
//!                                   ▼ online                         ▼ offline
//!                        delivery-<instance> topic          store + push wake-up
//!                                                                    │
//!                                            GET /messages ──► drain-and-delete
//! ```
//!
//! All durable state sits behind capability traits (presence fetcher,
//! device-token fetcher, delivery producer, push notifier, message
//! store), so swapping the in-memory backends for managed services is a
//! wiring change in `main`, not a core change.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod deliver;
pub mod envelope;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod presence;
pub mod processor;
pub mod queue;
pub mod server;
pub mod service;
pub mod store;
pub mod transform;
pub mod urn;

pub use config::{Config, LogFormat};
pub use deliver::{DeliveryProducer, MemoryDeliveryProducer};
pub use envelope::SecureEnvelope;
pub use error::{
    ContractError, ProcessError, QueueError, Result, RouterError, TransformError, UrnError,
};
pub use ingest::{IngestionProducer, MemoryIngestionProducer};
pub use notify::{DeviceToken, Platform, PushNotifier, StdoutNotifier, WebhookNotifier};
pub use pipeline::Pipeline;
pub use presence::{ConnectionInfo, Fetcher, MemoryCache, Protocol};
pub use processor::{DELIVERY_TOPIC_PREFIX, PushOutcome, RouteOutcome, RoutingProcessor};
pub use queue::{
    AckHandle, MemoryBroker, MemoryConsumer, MemorySubscription, MessageConsumer, NoopAck,
    RawMessage,
};
pub use server::{AppState, build_router};
pub use service::{Dependencies, RoutingService};
pub use store::{MemoryMessageStore, MessageStore};
pub use transform::transform;
pub use urn::Urn;
