//! External prompt moderation client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// HTTP request timeout for a single moderation call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the moderation client.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// The HTTP request itself failed (network, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The moderation service returned a non-2xx status.
    #[error("Moderation service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Result of moderating one piece of prompt text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModerationVerdict {
    /// Whether the text was flagged.
    pub flagged: bool,
    /// Categories that tripped, for the rejection message.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Seam over the external moderation service.
#[async_trait]
pub trait Moderator: Send + Sync {
    /// Moderate raw prompt text.
    async fn check(&self, text: &str) -> Result<ModerationVerdict, ModerationError>;
}

/// Moderation endpoint configuration.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub base_url: String,
    pub token: String,
}

impl ModerationConfig {
    /// Load from `MODERATION_ENDPOINT` and `MODERATION_TOKEN` (both
    /// required).
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("MODERATION_ENDPOINT")
                .expect("MODERATION_ENDPOINT must be set"),
            token: std::env::var("MODERATION_TOKEN").expect("MODERATION_TOKEN must be set"),
        }
    }
}

/// HTTP client for the moderation service.
pub struct ModerationApi {
    client: reqwest::Client,
    config: ModerationConfig,
}

impl ModerationApi {
    pub fn new(config: ModerationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, config }
    }
}

#[async_trait]
impl Moderator for ModerationApi {
    async fn check(&self, text: &str) -> Result<ModerationVerdict, ModerationError> {
        let response = self
            .client
            .post(format!("{}/moderate", self.config.base_url))
            .bearer_auth(&self.config.token)
            .json(&serde_json::json!({ "input": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ModerationError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn flagged_verdict_parses_categories() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/moderate")
            .match_header("authorization", "Bearer mod-token")
            .with_status(200)
            .with_body(r#"{"flagged":true,"categories":["violence"]}"#)
            .create_async()
            .await;

        let api = ModerationApi::new(ModerationConfig {
            base_url: server.url(),
            token: "mod-token".into(),
        });
        let verdict = api.check("some prompt").await.unwrap();
        assert!(verdict.flagged);
        assert_eq!(verdict.categories, vec!["violence".to_string()]);
    }

    #[tokio::test]
    async fn non_2xx_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/moderate")
            .with_status(503)
            .create_async()
            .await;

        let api = ModerationApi::new(ModerationConfig {
            base_url: server.url(),
            token: "mod-token".into(),
        });
        let err = api.check("some prompt").await.unwrap_err();
        assert_matches!(err, ModerationError::Api { status: 503, .. });
    }
}
