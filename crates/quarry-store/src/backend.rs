use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stored item: id, vector, and arbitrary JSON payload.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// A search hit, best matches carrying the highest score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Exact-match metadata conditions, all of which must hold.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub equals: Vec<(String, String)>,
}

impl MetadataFilter {
    #[must_use]
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self {
            equals: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }
}

/// Storage backend for named vector collections. A single `upsert` call is
/// the unit of atomicity: it either applies entirely or not at all, and
/// readers never observe a partially applied batch.
pub trait VectorBackend: Send + Sync {
    /// Create the collection if it does not exist. Idempotent.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, StoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Nearest neighbours of `vector`, best match first, up to `limit`.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<MetadataFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredPoint>, StoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Optional capability: backends that can enumerate their collections
    /// return a lister; the rest return `None` and callers degrade
    /// gracefully.
    fn namespace_lister(&self) -> Option<&dyn NamespaceLister> {
        None
    }
}

pub trait NamespaceLister: Send + Sync {
    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_from_map() {
        let mut map = HashMap::new();
        map.insert("source".to_owned(), "a.txt".to_owned());
        let filter = MetadataFilter::from_map(&map);
        assert_eq!(filter.equals.len(), 1);
        assert!(!filter.is_empty());
    }

    #[test]
    fn default_filter_is_empty() {
        assert!(MetadataFilter::default().is_empty());
    }
}
