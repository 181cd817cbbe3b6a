//! Batched, cached resource resolution.
//!
//! Resolution is cache-or-fetch: cached entries are served from a
//! TTL-bounded in-memory cache, misses are batch-fetched from the
//! source-of-truth store in bounded chunks, and results populate the
//! cache for the next caller. Last-writer-wins on population is fine —
//! resources are immutable per version.

use std::sync::Arc;
use std::time::Duration;

use atelier_core::resource::Resource;
use atelier_core::types::DbId;
use moka::sync::Cache;

use crate::stores::ResourceStore;

/// How long a resolved resource stays cached.
const CACHE_TTL: Duration = Duration::from_secs(3600); // 1 hour

/// Maximum cached resources.
const CACHE_CAPACITY: u64 = 50_000;

/// Maximum IDs per source-of-truth query, bounding query fan-out.
const FETCH_CHUNK_SIZE: usize = 500;

/// Resolves opaque resource IDs into cached metadata.
pub struct ResourceResolver {
    cache: Cache<DbId, Resource>,
    store: Arc<dyn ResourceStore>,
}

impl ResourceResolver {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();
        Self { cache, store }
    }

    /// Resolve a batch of resource IDs.
    ///
    /// Returns resources in input order. IDs with no matching record
    /// are simply absent from the result — the caller decides whether
    /// a partial resolution is an error.
    pub async fn resolve(&self, ids: &[DbId]) -> anyhow::Result<Vec<Resource>> {
        let mut unique_ids: Vec<DbId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique_ids.contains(id) {
                unique_ids.push(*id);
            }
        }

        let mut misses: Vec<DbId> = Vec::new();
        for id in &unique_ids {
            if self.cache.get(id).is_none() {
                misses.push(*id);
            }
        }

        for chunk in misses.chunks(FETCH_CHUNK_SIZE) {
            let fetched = self.store.fetch_by_ids(chunk).await?;
            for resource in fetched {
                self.cache.insert(resource.id, resource);
            }
        }

        Ok(unique_ids
            .iter()
            .filter_map(|id| self.cache.get(id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atelier_core::resource::{Availability, ModelType};
    use std::sync::Mutex;

    struct RecordingStore {
        resources: Vec<Resource>,
        batches: Mutex<Vec<usize>>,
    }

    impl RecordingStore {
        fn with_ids(ids: &[DbId]) -> Self {
            Self {
                resources: ids.iter().map(|id| test_resource(*id)).collect(),
                batches: Mutex::new(Vec::new()),
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceStore for RecordingStore {
        async fn fetch_by_ids(&self, ids: &[DbId]) -> anyhow::Result<Vec<Resource>> {
            self.batches.lock().unwrap().push(ids.len());
            Ok(self
                .resources
                .iter()
                .filter(|r| ids.contains(&r.id))
                .cloned()
                .collect())
        }
    }

    fn test_resource(id: DbId) -> Resource {
        Resource {
            id,
            model_id: id * 10,
            name: format!("resource-{id}"),
            model_type: ModelType::Lora,
            base_model: "SD1".into(),
            trained_words: vec![],
            covered: true,
            availability: Availability::Public,
            poi: false,
            settings: None,
        }
    }

    #[tokio::test]
    async fn second_resolve_is_served_from_cache() {
        let store = Arc::new(RecordingStore::with_ids(&[1, 2]));
        let resolver = ResourceResolver::new(store.clone());

        let first = resolver.resolve(&[1, 2]).await.unwrap();
        assert_eq!(first.len(), 2);
        let second = resolver.resolve(&[1, 2]).await.unwrap();
        assert_eq!(second.len(), 2);

        // Only the first call reached the store.
        assert_eq!(store.batch_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn partial_misses_are_not_an_error() {
        let store = Arc::new(RecordingStore::with_ids(&[1]));
        let resolver = ResourceResolver::new(store);

        let resolved = resolver.resolve(&[1, 99]).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, 1);
    }

    #[tokio::test]
    async fn large_batches_are_chunked() {
        let ids: Vec<DbId> = (1..=1200).collect();
        let store = Arc::new(RecordingStore::with_ids(&ids));
        let resolver = ResourceResolver::new(store.clone());

        let resolved = resolver.resolve(&ids).await.unwrap();
        assert_eq!(resolved.len(), 1200);
        assert_eq!(store.batch_sizes(), vec![500, 500, 200]);
    }

    #[tokio::test]
    async fn duplicate_ids_resolve_once() {
        let store = Arc::new(RecordingStore::with_ids(&[5]));
        let resolver = ResourceResolver::new(store.clone());

        let resolved = resolver.resolve(&[5, 5, 5]).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(store.batch_sizes(), vec![1]);
    }
}
