//! Webhook push backend
//!
//! POSTs a wake-up notification as JSON to a vendor bridge (a service
//! that speaks APNs/FCM on our behalf). The notification deliberately
//! carries no ciphertext: the recipient's client fetches the envelope
//! through its normal channel once woken.

use crate::envelope::SecureEnvelope;
use crate::error::ContractError;
use crate::notify::{DeviceToken, PushNotifier};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// JSON payload sent to the vendor bridge
#[derive(Serialize)]
struct PushRequest<'a> {
    tokens: &'a [DeviceToken],
    message_id: &'a str,
    recipient_id: String,
}

/// Push notifier that POSTs wake-ups to an HTTP endpoint
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier for the given bridge URL
    ///
    /// Uses default timeouts: 30s request timeout, 10s connection timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, ContractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ContractError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PushNotifier for WebhookNotifier {
    async fn notify(
        &self,
        tokens: &[DeviceToken],
        envelope: &SecureEnvelope,
    ) -> Result<(), ContractError> {
        if tokens.is_empty() {
            return Ok(());
        }

        let request = PushRequest {
            tokens,
            message_id: &envelope.message_id,
            recipient_id: envelope.recipient_id.to_string(),
        };

        match self.client.post(&self.url).json(&request).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    debug!(
                        url = %self.url,
                        tokens = tokens.len(),
                        recipient = %envelope.recipient_id,
                        "push notification delivered"
                    );
                    Ok(())
                } else {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    error!(
                        url = %self.url,
                        status = %status,
                        body = %body,
                        "push bridge rejected notification"
                    );
                    Err(ContractError::Notify(format!(
                        "push bridge returned {status}: {body}"
                    )))
                }
            }
            Err(e) => {
                error!(url = %self.url, error = %e, "push bridge unreachable");
                Err(ContractError::Notify(format!(
                    "failed to reach {}: {e}",
                    self.url
                )))
            }
        }
    }
}
