//! HTTP client for the remote job service.
//!
//! Every call resolves its endpoint through [`choose_endpoint`] from
//! the job's submission timestamp, attaches that endpoint's bearer
//! token, and surfaces HTTP 429 as a distinct rate-limit error.

use std::time::Duration;

use atelier_core::types::Timestamp;

use crate::payload::{
    ClearAssetsPayload, CopyAssetPayload, CopyAssetResult, JobEvent, JobHandle, JobPayload,
    JobSnapshot, SubmitJobsResponse, TaintJobRequest, TextToImagePayload, TrainingPayload,
};
use crate::routing::{choose_endpoint, RoutingConfig};

/// HTTP request timeout for a single call to the job service.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the job service client.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service rate-limited the request (HTTP 429). Distinct from
    /// internal quota limiting and from generic failures.
    #[error("Job service rate limited the request")]
    RateLimited,

    /// The service returned a non-2xx status other than 429.
    #[error("Job service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response that could not be interpreted.
    #[error("Malformed job service response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A submission response with an empty `jobs` array.
    #[error("Job service accepted the submission but returned no jobs")]
    EmptyResponse,
}

/// Typed client wrapping the remote job service HTTP API.
pub struct OrchestratorApi {
    client: reqwest::Client,
    routing: RoutingConfig,
}

impl OrchestratorApi {
    /// Create a client with a fresh connection pool.
    pub fn new(routing: RoutingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, routing }
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, routing: RoutingConfig) -> Self {
        Self { client, routing }
    }

    /// Submit an image-generation job.
    pub async fn submit_text_to_image(
        &self,
        payload: TextToImagePayload,
        submitted_at: Timestamp,
    ) -> Result<JobHandle, OrchestratorError> {
        self.submit_job(&JobPayload::TextToImage(payload), submitted_at)
            .await
    }

    /// Submit a model fine-tuning job.
    pub async fn submit_training(
        &self,
        payload: TrainingPayload,
        submitted_at: Timestamp,
    ) -> Result<JobHandle, OrchestratorError> {
        self.submit_job(&JobPayload::ImageResourceTraining(payload), submitted_at)
            .await
    }

    /// Fetch the current snapshot of a job, including its assigned
    /// service providers.
    pub async fn get_job(
        &self,
        job_id: &str,
        submitted_at: Timestamp,
    ) -> Result<JobSnapshot, OrchestratorError> {
        let endpoint = choose_endpoint(submitted_at, &self.routing);
        let response = self
            .client
            .get(format!("{}/jobs/{job_id}", endpoint.base_url))
            .bearer_auth(&endpoint.token)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Fetch lifecycle events for a job, most recent first when
    /// `descending` is set.
    pub async fn get_job_events(
        &self,
        job_id: &str,
        take: u32,
        descending: bool,
        submitted_at: Timestamp,
    ) -> Result<Vec<JobEvent>, OrchestratorError> {
        let endpoint = choose_endpoint(submitted_at, &self.routing);
        let response = self
            .client
            .get(format!("{}/jobs/{job_id}/events", endpoint.base_url))
            .query(&[("take", take.to_string()), ("descending", descending.to_string())])
            .bearer_auth(&endpoint.token)
            .send()
            .await?;
        let events: Vec<JobEvent> = Self::parse_response(response).await?;
        tracing::debug!(job_id, count = events.len(), "Fetched job events");
        Ok(events)
    }

    /// Copy one output asset of a job to a destination URI.
    ///
    /// Expressed on the wire as a `copyAsset` job whose result is
    /// returned inline.
    pub async fn copy_asset(
        &self,
        job_id: &str,
        asset_name: &str,
        destination_uri: &str,
        submitted_at: Timestamp,
    ) -> Result<CopyAssetResult, OrchestratorError> {
        let payload = JobPayload::CopyAsset(CopyAssetPayload {
            job_id: job_id.to_string(),
            asset_name: asset_name.to_string(),
            destination_uri: destination_uri.to_string(),
        });
        let handle = self.submit_job(&payload, submitted_at).await?;
        let result = handle.result.ok_or(OrchestratorError::EmptyResponse)?;
        Ok(serde_json::from_value(result)?)
    }

    /// Delete all stored assets of a job.
    pub async fn clear_assets(
        &self,
        job_id: &str,
        submitted_at: Timestamp,
    ) -> Result<(), OrchestratorError> {
        let payload = JobPayload::ClearAssets(ClearAssetsPayload {
            job_id: job_id.to_string(),
        });
        self.submit_job(&payload, submitted_at).await.map(|_| ())
    }

    /// Taint (cancel) a job with a reason and context string.
    pub async fn taint_job(
        &self,
        job_id: &str,
        reason: &str,
        context: &str,
        submitted_at: Timestamp,
    ) -> Result<(), OrchestratorError> {
        tracing::debug!(job_id, reason, "Tainting job");
        let endpoint = choose_endpoint(submitted_at, &self.routing);
        let body = TaintJobRequest {
            reason: reason.to_string(),
            context: context.to_string(),
        };
        let response = self
            .client
            .put(format!("{}/jobs/{job_id}", endpoint.base_url))
            .bearer_auth(&endpoint.token)
            .json(&body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// POST a payload to `/jobs` and return the first accepted job.
    async fn submit_job(
        &self,
        payload: &JobPayload,
        submitted_at: Timestamp,
    ) -> Result<JobHandle, OrchestratorError> {
        let endpoint = choose_endpoint(submitted_at, &self.routing);
        let response = self
            .client
            .post(format!("{}/jobs", endpoint.base_url))
            .bearer_auth(&endpoint.token)
            .json(payload)
            .send()
            .await?;
        let parsed: SubmitJobsResponse = Self::parse_response(response).await?;
        let handle = parsed
            .jobs
            .into_iter()
            .next()
            .ok_or(OrchestratorError::EmptyResponse)?;
        tracing::debug!(job_id = %handle.job_id, "Job submission accepted");
        Ok(handle)
    }

    /// Ensure the response has a success status code. 429 maps to the
    /// dedicated rate-limit variant; other non-2xx statuses carry the
    /// body text along for debugging.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, OrchestratorError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OrchestratorError::RateLimited);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(OrchestratorError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, OrchestratorError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), OrchestratorError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
