//! Analytical query for historical generation usage.
//!
//! Only consulted on quota-limiter cold starts; afterwards the limiter
//! counts in memory.

use atelier_core::types::DbId;
use sqlx::PgPool;

/// Read access to the generation history log.
pub struct GenerationUsageRepo;

impl GenerationUsageRepo {
    /// Count images a user submitted in the trailing 24 hours.
    pub async fn count_last_24h(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(quantity), 0) \
             FROM generation_history \
             WHERE user_id = $1 AND created_at > NOW() - INTERVAL '24 hours'",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
