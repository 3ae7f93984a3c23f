//! Out-of-band code delivery
//!
//! The plaintext code leaves the process only through a [`Notifier`].
//! Nothing here logs it.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::OtpError;
use super::types::OtpPurpose;
use crate::core_types::{TimestampMs, UserId};

/// One code to deliver
#[derive(Clone, Serialize)]
pub struct CodeDelivery {
    pub user_id: UserId,
    pub purpose: OtpPurpose,
    pub reference: Option<String>,
    pub code: String,
    pub expires_at: TimestampMs,
}

impl std::fmt::Debug for CodeDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeDelivery")
            .field("user_id", &self.user_id)
            .field("purpose", &self.purpose)
            .field("reference", &self.reference)
            .field("code", &"******")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, delivery: &CodeDelivery) -> Result<(), OtpError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Log,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    pub webhook_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            webhook_url: None,
            timeout_ms: 3_000,
        }
    }
}

/// Records that a code was dispatched, without the code
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, delivery: &CodeDelivery) -> Result<(), OtpError> {
        tracing::info!(
            user_id = delivery.user_id,
            purpose = %delivery.purpose,
            reference = ?delivery.reference,
            expires_at = delivery.expires_at,
            "Verification code dispatched"
        );
        Ok(())
    }
}

/// POSTs each delivery as JSON to an SMS/e-mail relay
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self, OtpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OtpError::Delivery(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, delivery: &CodeDelivery) -> Result<(), OtpError> {
        let response = self
            .client
            .post(&self.url)
            .json(delivery)
            .send()
            .await
            .map_err(|e| OtpError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OtpError::Delivery(format!(
                "relay responded {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Keeps deliveries in memory so simulations and tests can read the codes
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    deliveries: Mutex<Vec<CodeDelivery>>,
    fail: Mutex<bool>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Most recent code sent to `user_id`
    pub fn last_code_for(&self, user_id: UserId) -> Option<String> {
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|d| d.user_id == user_id)
            .map(|d| d.code.clone())
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn deliver(&self, delivery: &CodeDelivery) -> Result<(), OtpError> {
        if *self.fail.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(OtpError::Delivery("memory notifier set to fail".into()));
        }
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(delivery.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(user_id: UserId, code: &str) -> CodeDelivery {
        CodeDelivery {
            user_id,
            purpose: OtpPurpose::Transaction,
            reference: None,
            code: code.to_string(),
            expires_at: 0,
        }
    }

    #[test]
    fn test_debug_redacts_code() {
        let rendered = format!("{:?}", delivery(1, "987654"));
        assert!(!rendered.contains("987654"));
    }

    #[tokio::test]
    async fn test_memory_notifier_last_code() {
        let notifier = MemoryNotifier::new();
        notifier.deliver(&delivery(1, "111111")).await.unwrap();
        notifier.deliver(&delivery(2, "222222")).await.unwrap();
        notifier.deliver(&delivery(1, "333333")).await.unwrap();
        assert_eq!(notifier.last_code_for(1).as_deref(), Some("333333"));
        assert_eq!(notifier.delivery_count(), 3);

        notifier.set_fail(true);
        assert!(notifier.deliver(&delivery(1, "444444")).await.is_err());
    }

    #[test]
    fn test_webhook_notifier_builds() {
        assert!(WebhookNotifier::new("http://localhost:9/otp".into(), Duration::from_secs(1)).is_ok());
    }
}
