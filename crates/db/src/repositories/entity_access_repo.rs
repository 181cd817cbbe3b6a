//! Batch entity-access checks for private resources.

use atelier_core::types::DbId;
use sqlx::PgPool;

/// Read access to entity access grants.
pub struct EntityAccessRepo;

impl EntityAccessRepo {
    /// Return the subset of `version_ids` the user is entitled to use.
    ///
    /// One batched query regardless of how many private resources the
    /// request carries.
    pub async fn accessible_ids(
        pool: &PgPool,
        user_id: DbId,
        version_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        if version_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT entity_id FROM entity_access \
             WHERE user_id = $1 AND entity_type = 'resource_version' AND entity_id = ANY($2)",
        )
        .bind(user_id)
        .bind(version_ids)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
