//! Storage seam for the training lifecycle monitor.
//!
//! The monitor depends on this trait rather than on the sqlx repos
//! directly so the sweep logic can be exercised with in-memory fakes.

use async_trait::async_trait;
use atelier_core::training::TrainingStatus;
use atelier_core::types::{DbId, Timestamp};
use atelier_db::models::{TrainingJobRow, TrainingResults};
use atelier_db::repositories::{ModelFileRepo, ModelVersionRepo};
use sqlx::PgPool;

/// Metadata key holding the fine-tuning parameters the job was
/// originally submitted with. Sibling of the training-results blob.
const TRAINING_PARAMS_KEY: &str = "training_params";

/// One training job as the sweep sees it.
#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub file_id: DbId,
    pub model_version_id: DbId,
    /// URI of the packaged training data.
    pub training_data_url: String,
    /// Fine-tuning parameters to reuse on resubmission.
    pub params: serde_json::Value,
    pub status: TrainingStatus,
    pub results: TrainingResults,
    pub updated_at: Timestamp,
}

impl TrainingJob {
    /// Build from a sweep-candidate row. `None` when the joined status
    /// column holds an unknown label.
    pub fn from_row(row: &TrainingJobRow) -> Option<Self> {
        Some(Self {
            file_id: row.id,
            model_version_id: row.model_version_id,
            training_data_url: row.url.clone(),
            params: row
                .metadata
                .get(TRAINING_PARAMS_KEY)
                .cloned()
                .unwrap_or_else(|| serde_json::json!({})),
            status: row.status()?,
            results: row.training_results().unwrap_or_default(),
            updated_at: row.updated_at,
        })
    }
}

/// Persistence operations the monitor needs.
#[async_trait]
pub trait TrainingStore: Send + Sync {
    /// List jobs in a monitored status untouched since `since`.
    async fn list_candidates(&self, since: Timestamp) -> anyhow::Result<Vec<TrainingJob>>;

    /// Persist a status transition together with the updated
    /// training-results blob.
    async fn update(
        &self,
        job: &TrainingJob,
        status: TrainingStatus,
        results: &TrainingResults,
    ) -> anyhow::Result<()>;

    /// Whether the job produced any output artifacts.
    async fn has_artifacts(&self, file_id: DbId) -> anyhow::Result<bool>;
}

/// sqlx-backed store over the model-file and model-version repos.
pub struct PgTrainingStore {
    pool: PgPool,
}

impl PgTrainingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrainingStore for PgTrainingStore {
    async fn list_candidates(&self, since: Timestamp) -> anyhow::Result<Vec<TrainingJob>> {
        let rows = ModelFileRepo::list_training_candidates(&self.pool, since).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let job = TrainingJob::from_row(row);
                if job.is_none() {
                    tracing::warn!(
                        file_id = row.id,
                        status = %row.training_status,
                        "Skipping candidate with unknown training status"
                    );
                }
                job
            })
            .collect())
    }

    async fn update(
        &self,
        job: &TrainingJob,
        status: TrainingStatus,
        results: &TrainingResults,
    ) -> anyhow::Result<()> {
        ModelFileRepo::update_training_results(&self.pool, job.file_id, results).await?;
        ModelVersionRepo::set_training_status(&self.pool, job.model_version_id, status).await?;
        Ok(())
    }

    async fn has_artifacts(&self, file_id: DbId) -> anyhow::Result<bool> {
        Ok(ModelFileRepo::has_training_artifacts(&self.pool, file_id).await?)
    }
}
