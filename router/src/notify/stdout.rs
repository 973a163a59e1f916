//! Stdout push backend for development
//!
//! Prints each wake-up as a JSON line instead of calling a vendor.

use crate::envelope::SecureEnvelope;
use crate::error::ContractError;
use crate::notify::{DeviceToken, PushNotifier};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

/// Push notifier that prints wake-ups for debugging
pub struct StdoutNotifier {
    notified_count: AtomicU64,
}

impl StdoutNotifier {
    pub fn new() -> Self {
        Self {
            notified_count: AtomicU64::new(0),
        }
    }

    /// Total wake-ups printed
    pub fn notified_count(&self) -> u64 {
        self.notified_count.load(Ordering::Relaxed)
    }
}

impl Default for StdoutNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushNotifier for StdoutNotifier {
    async fn notify(
        &self,
        tokens: &[DeviceToken],
        envelope: &SecureEnvelope,
    ) -> Result<(), ContractError> {
        use std::io::Write;

        let line = json!({
            "push": {
                "recipientId": envelope.recipient_id.to_string(),
                "messageId": envelope.message_id,
                "tokens": tokens.len(),
            }
        });

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").ok();

        self.notified_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
