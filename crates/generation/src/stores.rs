//! Store seams backing the resolver, limiter, and access checks.
//!
//! Each trait has a Postgres implementation wrapping the `atelier-db`
//! repositories; tests substitute in-memory fakes.

use async_trait::async_trait;
use atelier_core::resource::Resource;
use atelier_core::types::DbId;
use atelier_db::repositories::{EntityAccessRepo, GenerationUsageRepo, ResourceRepo};
use sqlx::PgPool;

/// Source-of-truth lookup for resource metadata.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch resources by version ID; absent IDs are simply missing
    /// from the result.
    async fn fetch_by_ids(&self, ids: &[DbId]) -> anyhow::Result<Vec<Resource>>;
}

/// Analytical usage counts for quota cold starts.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Images submitted by the user in the trailing 24 hours.
    async fn count_last_24h(&self, user_id: DbId) -> anyhow::Result<i64>;
}

/// Batch entitlement check for private resources.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    /// Subset of `version_ids` the user may use.
    async fn accessible_ids(&self, user_id: DbId, version_ids: &[DbId])
        -> anyhow::Result<Vec<DbId>>;
}

/// Postgres-backed resource store.
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn fetch_by_ids(&self, ids: &[DbId]) -> anyhow::Result<Vec<Resource>> {
        let rows = ResourceRepo::fetch_by_ids(&self.pool, ids).await?;
        Ok(rows.into_iter().map(|row| row.into_domain()).collect())
    }
}

/// Postgres-backed usage source.
pub struct PgUsageSource {
    pool: PgPool,
}

impl PgUsageSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageSource for PgUsageSource {
    async fn count_last_24h(&self, user_id: DbId) -> anyhow::Result<i64> {
        Ok(GenerationUsageRepo::count_last_24h(&self.pool, user_id).await?)
    }
}

/// Postgres-backed access checker.
pub struct PgAccessChecker {
    pool: PgPool,
}

impl PgAccessChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessChecker for PgAccessChecker {
    async fn accessible_ids(
        &self,
        user_id: DbId,
        version_ids: &[DbId],
    ) -> anyhow::Result<Vec<DbId>> {
        Ok(EntityAccessRepo::accessible_ids(&self.pool, user_id, version_ids).await?)
    }
}
