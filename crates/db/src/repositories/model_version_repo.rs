//! Repository for the `model_versions` training-status column.

use atelier_core::training::TrainingStatus;
use atelier_core::types::DbId;
use sqlx::PgPool;

/// Write access to model-version training status.
pub struct ModelVersionRepo;

impl ModelVersionRepo {
    /// Set the training status of a model version.
    pub async fn set_training_status(
        pool: &PgPool,
        version_id: DbId,
        status: TrainingStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE model_versions SET training_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(version_id)
            .bind(status.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }
}
