//! High-value identity-assurance gate
//!
//! Transactions at or above the threshold need a positive decision from the
//! identity service. A gate that cannot answer counts as a denial.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::{Amount, TransactionRef, UserId};

/// Status reported when the gate could not be consulted
pub const STATUS_UNAVAILABLE: &str = "UNAVAILABLE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    /// Identity-verification status of the user, e.g. `VERIFIED`
    pub status: String,
}

#[derive(Error, Debug, Clone)]
pub enum GateError {
    #[error("Identity gate unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait HighValueGate: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(
        &self,
        user_id: UserId,
        reference: TransactionRef,
        amount: Amount,
    ) -> Result<GateDecision, GateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    #[default]
    Static,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub kind: GateKind,
    /// Decision of the static gate
    pub allow: bool,
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            kind: GateKind::Static,
            allow: true,
            url: None,
            timeout_ms: 3_000,
        }
    }
}

/// Fixed decision; for development and tests
pub struct StaticGate {
    decision: GateDecision,
}

impl StaticGate {
    pub fn allow_all() -> Self {
        Self {
            decision: GateDecision {
                allowed: true,
                status: "VERIFIED".to_string(),
            },
        }
    }

    pub fn deny_all(status: &str) -> Self {
        Self {
            decision: GateDecision {
                allowed: false,
                status: status.to_string(),
            },
        }
    }
}

#[async_trait]
impl HighValueGate for StaticGate {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn check(
        &self,
        _user_id: UserId,
        _reference: TransactionRef,
        _amount: Amount,
    ) -> Result<GateDecision, GateError> {
        Ok(self.decision.clone())
    }
}

#[derive(Debug, Serialize)]
struct GateRequest {
    user_id: UserId,
    reference: String,
    amount: Amount,
}

/// Asks an external identity service over HTTP.
///
/// `POST {url}` with `{user_id, reference, amount}`, expecting
/// `{allowed, status}` back.
pub struct HttpIdentityGate {
    client: reqwest::Client,
    url: String,
}

impl HttpIdentityGate {
    pub fn new(url: String, timeout: Duration) -> Result<Self, GateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Unavailable(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl HighValueGate for HttpIdentityGate {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn check(
        &self,
        user_id: UserId,
        reference: TransactionRef,
        amount: Amount,
    ) -> Result<GateDecision, GateError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GateRequest {
                user_id,
                reference: reference.to_string(),
                amount,
            })
            .send()
            .await
            .map_err(|e| GateError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GateError::Unavailable(format!(
                "identity service responded {}",
                response.status()
            )));
        }
        response
            .json::<GateDecision>()
            .await
            .map_err(|e| GateError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_gate() {
        let allow = StaticGate::allow_all();
        let decision = allow.check(1, TransactionRef::new(), 10_000_000).await.unwrap();
        assert!(decision.allowed);

        let deny = StaticGate::deny_all("PENDING_REVIEW");
        let decision = deny.check(1, TransactionRef::new(), 10_000_000).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.status, "PENDING_REVIEW");
    }

    #[tokio::test]
    async fn test_http_gate_unreachable_is_error() {
        let gate =
            HttpIdentityGate::new("http://127.0.0.1:9/identity".into(), Duration::from_millis(200))
                .unwrap();
        assert!(gate.check(1, TransactionRef::new(), 1).await.is_err());
    }
}
