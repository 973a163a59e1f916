//! Error types for the routing service

use thiserror::Error;

/// Result type alias for service-level operations
pub type Result<T> = std::result::Result<T, RouterError>;

/// Top-level error for service assembly and lifecycle
#[derive(Error, Debug)]
pub enum RouterError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error (listener bind, socket teardown)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Broker/queue error
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Pipeline lifecycle error
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Shutdown did not complete cleanly
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

/// Errors surfaced by the dependency contracts (presence, tokens,
/// producers, notifier, store).
///
/// `NotFound` is the only variant the routing decision branches on; all
/// other variants are opaque backend failures.
#[derive(Error, Debug)]
pub enum ContractError {
    /// The requested key has no entry
    #[error("not found")]
    NotFound,

    /// Publish to a broker topic failed
    #[error("publish failed: {0}")]
    Publish(String),

    /// Store read or write failed
    #[error("storage failed: {0}")]
    Storage(String),

    /// Push notification failed
    #[error("notify failed: {0}")]
    Notify(String),

    /// Backend could not be reached or constructed
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl ContractError {
    /// True for a cache/store miss, as opposed to an infrastructure failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContractError::NotFound)
    }
}

/// Errors from the broker abstraction
#[derive(Error, Debug)]
pub enum QueueError {
    /// Topic buffer is at capacity
    #[error("topic '{topic}' is full")]
    Full { topic: String },

    /// Topic has no live subscriber side
    #[error("topic '{topic}' is closed")]
    Closed { topic: String },

    /// A topic supports exactly one subscription
    #[error("topic '{topic}' already has a subscriber")]
    AlreadySubscribed { topic: String },

    /// Consumer was started twice
    #[error("consumer already started")]
    AlreadyStarted,
}

/// Malformed-input errors from the envelope transformer.
///
/// Any value of this type means the message must be acked and dropped,
/// never retried.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Payload is not a valid envelope document
    #[error("malformed envelope payload in message {message_id}: {source}")]
    Decode {
        message_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Envelope decoded but carries no sender identity
    #[error("message {message_id} has a zero sender URN")]
    ZeroSender { message_id: String },

    /// Envelope decoded but carries no recipient identity
    #[error("message {message_id} has a zero recipient URN")]
    ZeroRecipient { message_id: String },
}

/// Transient routing failures. Returning one of these nacks the message
/// so the broker redelivers it.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Live fan-out publish failed
    #[error("delivery publish to {topic} for {recipient} failed: {source}")]
    Delivery {
        recipient: String,
        topic: String,
        #[source]
        source: ContractError,
    },

    /// Offline store write failed
    #[error("offline store for {recipient} failed: {source}")]
    Store {
        recipient: String,
        #[source]
        source: ContractError,
    },
}

/// A string that does not parse as a URN in either accepted form
#[derive(Error, Debug, PartialEq, Eq)]
#[error("malformed URN '{0}'")]
pub struct UrnError(pub String);
