//! Repository for the `resource_versions` table (read-only here).

use atelier_core::types::DbId;
use sqlx::PgPool;

use crate::models::ResourceRow;

/// Column list for `resource_versions` queries.
const COLUMNS: &str = "\
    id, model_id, name, model_type, base_model, trained_words, \
    covered, availability, poi, min_strength, max_strength";

/// Read access to resource version metadata.
pub struct ResourceRepo;

impl ResourceRepo {
    /// Fetch resource versions by ID.
    ///
    /// IDs with no matching row are simply absent from the result; the
    /// caller decides whether that matters. The resolver chunks its
    /// requests, so `ids` is already bounded when this runs.
    pub async fn fetch_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<ResourceRow>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {COLUMNS} FROM resource_versions WHERE id = ANY($1)");
        sqlx::query_as::<_, ResourceRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
