//! Push-notification contract
//!
//! When a recipient is offline the envelope is stored first, then a
//! wake-up is attempted against their registered device tokens. Notify
//! failures are tolerable by design: the envelope is already durable, so
//! the pipeline never retries a message because its push failed.

pub mod stdout;
pub mod webhook;

use crate::envelope::SecureEnvelope;
use crate::error::ContractError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use stdout::StdoutNotifier;
pub use webhook::WebhookNotifier;

/// A push-notification token registered by one of the recipient's devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceToken {
    /// Vendor token issued by the device OS
    pub token: String,

    /// Mobile platform the token belongs to
    pub platform: Platform,
}

/// Mobile platform of a device token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

/// Sends a wake-up for an envelope to a set of device tokens
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify(
        &self,
        tokens: &[DeviceToken],
        envelope: &SecureEnvelope,
    ) -> Result<(), ContractError>;
}
