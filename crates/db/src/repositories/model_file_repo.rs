//! Repository for model files and their training-results metadata.

use atelier_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::model_file::TRAINING_RESULTS_KEY;
use crate::models::{ModelFileRow, TrainingJobRow, TrainingResults};

/// Column list for `model_files` queries.
const COLUMNS: &str = "id, model_version_id, url, metadata, created_at, updated_at";

/// Hard cap on sweep candidates per query.
const MAX_SWEEP_CANDIDATES: i64 = 500;

/// Read/write access to model files.
pub struct ModelFileRepo;

impl ModelFileRepo {
    /// Fetch one model file by ID.
    pub async fn get(pool: &PgPool, file_id: DbId) -> Result<Option<ModelFileRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM model_files WHERE id = $1");
        sqlx::query_as::<_, ModelFileRow>(&query)
            .bind(file_id)
            .fetch_optional(pool)
            .await
    }

    /// List sweep candidates: files whose version is in `submitted` or
    /// `processing` training status and which have not been touched
    /// since `since`.
    ///
    /// The watermark bounds the scan; without it every sweep would walk
    /// the whole table.
    pub async fn list_training_candidates(
        pool: &PgPool,
        since: Timestamp,
    ) -> Result<Vec<TrainingJobRow>, sqlx::Error> {
        let query = "\
            SELECT mf.id, mf.model_version_id, mf.url, mf.metadata, \
                   mv.training_status, mf.updated_at \
            FROM model_files mf \
            JOIN model_versions mv ON mv.id = mf.model_version_id \
            WHERE mv.training_status IN ('submitted', 'processing') \
              AND mf.updated_at < $1 \
            ORDER BY mf.updated_at ASC \
            LIMIT $2";
        let rows = sqlx::query_as::<_, TrainingJobRow>(query)
            .bind(since)
            .bind(MAX_SWEEP_CANDIDATES)
            .fetch_all(pool)
            .await?;
        tracing::debug!(count = rows.len(), "Listed training candidates");
        Ok(rows)
    }

    /// Overwrite the training-results blob inside the metadata column.
    ///
    /// Uses `jsonb_set` so sibling metadata keys written by other flows
    /// survive untouched.
    pub async fn update_training_results(
        pool: &PgPool,
        file_id: DbId,
        results: &TrainingResults,
    ) -> Result<(), sqlx::Error> {
        let value = serde_json::to_value(results)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query(
            "UPDATE model_files \
             SET metadata = jsonb_set(COALESCE(metadata, '{}'::jsonb), $2, $3, true), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(file_id)
        .bind([TRAINING_RESULTS_KEY])
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Whether a training attempt produced any output artifacts.
    ///
    /// A targeted existence check on the epoch rows written by the
    /// completion callback; a `Succeeded` job with zero epochs is
    /// treated as a failure by the sweep.
    pub async fn has_training_artifacts(
        pool: &PgPool,
        file_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM training_epochs WHERE model_file_id = $1)",
        )
        .bind(file_id)
        .fetch_one(pool)
        .await?;
        Ok(exists.0)
    }
}
