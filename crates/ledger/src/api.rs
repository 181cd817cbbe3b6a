//! HTTP client for the ledger service.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::service::{DebitRequest, LedgerService};

/// HTTP request timeout for a single ledger call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Refund retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// Errors from the ledger client.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The HTTP request itself failed (network, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The debit account cannot cover the requested amount.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// The ledger returned an unexpected non-2xx status.
    #[error("Ledger error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A refund could not be completed after all retries. The debit
    /// stands until someone reconciles it manually.
    #[error("Refund of transaction {transaction_id} requires manual reconciliation")]
    ReconciliationRequired { transaction_id: String },
}

/// Ledger endpoint configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Base URL, e.g. `https://ledger.internal`.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
}

impl LedgerConfig {
    /// Load from `LEDGER_ENDPOINT` and `LEDGER_TOKEN` (both required).
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("LEDGER_ENDPOINT").expect("LEDGER_ENDPOINT must be set"),
            token: std::env::var("LEDGER_TOKEN").expect("LEDGER_TOKEN must be set"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebitResponse {
    transaction_id: String,
}

/// HTTP client for the internal currency ledger.
pub struct LedgerApi {
    client: reqwest::Client,
    config: LedgerConfig,
    retry_delays: Vec<Duration>,
}

impl LedgerApi {
    /// Create a client with the default refund retry schedule.
    pub fn new(config: LedgerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            config,
            retry_delays: RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }

    /// Override the refund retry delays (used in tests to avoid
    /// sleeping through the backoff schedule).
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    async fn try_refund(&self, transaction_id: &str, reason: &str) -> Result<(), LedgerError> {
        let response = self
            .client
            .post(format!(
                "{}/transactions/{transaction_id}/refund",
                self.config.base_url
            ))
            .bearer_auth(&self.config.token)
            .json(&serde_json::json!({ "reason": reason }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LedgerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerService for LedgerApi {
    async fn debit(&self, request: DebitRequest) -> Result<String, LedgerError> {
        let body = serde_json::json!({
            "fromAccountId": request.from_account_id,
            "toAccountId": request.to_account_id,
            "amount": request.amount,
            "type": request.transaction_type.as_str(),
            "details": request.details,
        });

        let response = self
            .client
            .post(format!("{}/transactions", self.config.base_url))
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Err(LedgerError::InsufficientFunds);
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LedgerError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: DebitResponse = response.json().await?;
        Ok(parsed.transaction_id)
    }

    /// Refund with bounded retry.
    ///
    /// Each failed attempt is logged and retried after a backoff delay.
    /// When the schedule is exhausted the failure is logged at error
    /// level for manual reconciliation — this is the one place the core
    /// accepts eventual inconsistency instead of blocking.
    async fn refund(&self, transaction_id: &str, reason: &str) -> Result<(), LedgerError> {
        let mut attempt = 0usize;
        loop {
            match self.try_refund(transaction_id, reason).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt >= self.retry_delays.len() {
                        tracing::error!(
                            transaction_id,
                            reason,
                            error = %e,
                            "Refund failed after all retries; manual reconciliation required"
                        );
                        return Err(LedgerError::ReconciliationRequired {
                            transaction_id: transaction_id.to_string(),
                        });
                    }
                    tracing::warn!(
                        transaction_id,
                        attempt = attempt + 1,
                        error = %e,
                        "Refund attempt failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delays[attempt]).await;
                    attempt += 1;
                }
            }
        }
    }
}
