//! Seam trait over the job service client.
//!
//! The submission orchestrator and the lifecycle monitor depend on this
//! trait rather than on [`OrchestratorApi`] directly so they can be
//! exercised with in-memory fakes.

use async_trait::async_trait;
use atelier_core::types::Timestamp;

use crate::api::{OrchestratorApi, OrchestratorError};
use crate::payload::{JobEvent, JobHandle, JobSnapshot, TextToImagePayload, TrainingPayload};

/// Operations the orchestration core needs from the remote job service.
#[async_trait]
pub trait JobGateway: Send + Sync {
    /// Submit an image-generation job.
    async fn submit_text_to_image(
        &self,
        payload: TextToImagePayload,
        submitted_at: Timestamp,
    ) -> Result<JobHandle, OrchestratorError>;

    /// Submit a model fine-tuning job.
    async fn submit_training(
        &self,
        payload: TrainingPayload,
        submitted_at: Timestamp,
    ) -> Result<JobHandle, OrchestratorError>;

    /// Fetch the current snapshot of a job.
    async fn get_job(
        &self,
        job_id: &str,
        submitted_at: Timestamp,
    ) -> Result<JobSnapshot, OrchestratorError>;

    /// Fetch the single most recent lifecycle event of a job.
    async fn latest_event(
        &self,
        job_id: &str,
        submitted_at: Timestamp,
    ) -> Result<Option<JobEvent>, OrchestratorError>;

    /// Taint (cancel) a job.
    async fn taint_job(
        &self,
        job_id: &str,
        reason: &str,
        context: &str,
        submitted_at: Timestamp,
    ) -> Result<(), OrchestratorError>;
}

#[async_trait]
impl JobGateway for OrchestratorApi {
    async fn submit_text_to_image(
        &self,
        payload: TextToImagePayload,
        submitted_at: Timestamp,
    ) -> Result<JobHandle, OrchestratorError> {
        OrchestratorApi::submit_text_to_image(self, payload, submitted_at).await
    }

    async fn submit_training(
        &self,
        payload: TrainingPayload,
        submitted_at: Timestamp,
    ) -> Result<JobHandle, OrchestratorError> {
        OrchestratorApi::submit_training(self, payload, submitted_at).await
    }

    async fn get_job(
        &self,
        job_id: &str,
        submitted_at: Timestamp,
    ) -> Result<JobSnapshot, OrchestratorError> {
        OrchestratorApi::get_job(self, job_id, submitted_at).await
    }

    async fn latest_event(
        &self,
        job_id: &str,
        submitted_at: Timestamp,
    ) -> Result<Option<JobEvent>, OrchestratorError> {
        let events = self.get_job_events(job_id, 1, true, submitted_at).await?;
        Ok(events.into_iter().next())
    }

    async fn taint_job(
        &self,
        job_id: &str,
        reason: &str,
        context: &str,
        submitted_at: Timestamp,
    ) -> Result<(), OrchestratorError> {
        OrchestratorApi::taint_job(self, job_id, reason, context, submitted_at).await
    }
}
