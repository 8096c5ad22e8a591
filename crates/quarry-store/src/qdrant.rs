use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};

use crate::backend::{
    BoxFuture, MetadataFilter, NamespaceLister, ScoredPoint, VectorBackend, VectorPoint,
};
use crate::error::StoreError;

/// Qdrant-backed vector storage using cosine distance.
pub struct QdrantBackend {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantBackend").finish_non_exhaustive()
    }
}

impl QdrantBackend {
    /// Connect to the Qdrant server at `url`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the client cannot be created.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

fn payload_to_qdrant(
    payload: HashMap<String, serde_json::Value>,
) -> Result<HashMap<String, qdrant_client::qdrant::Value>, StoreError> {
    let json = serde_json::Value::Object(payload.into_iter().collect());
    serde_json::from_value(json).map_err(StoreError::from)
}

fn point_id_to_string(id: qdrant_client::qdrant::PointId) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id.point_id_options {
        Some(PointIdOptions::Uuid(s)) => s,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => {
            serde_json::Number::from_f64(d).map_or(serde_json::Value::Null, serde_json::Value::Number)
        }
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        _ => serde_json::Value::Null,
    }
}

impl VectorBackend for QdrantBackend {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            if exists {
                return Ok(());
            }

            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&collection)
                        .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
                )
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;

            tracing::debug!(collection, vector_size, "created Qdrant collection");
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .collection_exists(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut qdrant_points = Vec::with_capacity(points.len());
            for p in points {
                let payload = payload_to_qdrant(p.payload)?;
                qdrant_points.push(PointStruct::new(p.id, p.vector, payload));
            }

            self.client
                .upsert_points(UpsertPointsBuilder::new(&collection, qdrant_points))
                .await
                .map_err(|e| StoreError::Upsert(e.to_string()))?;
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<MetadataFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredPoint>, StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut builder =
                SearchPointsBuilder::new(&collection, vector, limit).with_payload(true);

            if let Some(f) = filter
                && !f.is_empty()
            {
                let conditions: Vec<Condition> = f
                    .equals
                    .into_iter()
                    .map(|(field, value)| Condition::matches(field, value))
                    .collect();
                builder = builder.filter(Filter::must(conditions));
            }

            let results = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| StoreError::Search(e.to_string()))?;

            Ok(results
                .result
                .into_iter()
                .map(|point| {
                    let id = point.id.map(point_id_to_string).unwrap_or_default();
                    let payload = point
                        .payload
                        .into_iter()
                        .map(|(k, v)| (k, qdrant_value_to_json(v)))
                        .collect();
                    ScoredPoint {
                        id,
                        score: point.score,
                        payload,
                    }
                })
                .collect())
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .delete_collection(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            Ok(())
        })
    }

    fn namespace_lister(&self) -> Option<&dyn NamespaceLister> {
        Some(self)
    }
}

impl NamespaceLister for QdrantBackend {
    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        Box::pin(async move {
            let response = self
                .client
                .list_collections()
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            Ok(response
                .collections
                .into_iter()
                .map(|c| c.name)
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_with_valid_url() {
        assert!(QdrantBackend::new("http://localhost:6334").is_ok());
    }

    #[test]
    fn new_with_invalid_url_fails() {
        assert!(QdrantBackend::new("not a valid url").is_err());
    }

    #[test]
    fn payload_roundtrip_strings_and_ints() {
        let mut payload = HashMap::new();
        payload.insert("text".to_owned(), serde_json::json!("hello"));
        payload.insert("sequence_index".to_owned(), serde_json::json!(4));
        let converted = payload_to_qdrant(payload).unwrap();
        assert_eq!(converted.len(), 2);

        let back: HashMap<String, serde_json::Value> = converted
            .into_iter()
            .map(|(k, v)| (k, qdrant_value_to_json(v)))
            .collect();
        assert_eq!(back["text"], serde_json::json!("hello"));
        assert_eq!(back["sequence_index"], serde_json::json!(4));
    }

    #[test]
    fn qdrant_value_none_kind_is_null() {
        let v = qdrant_client::qdrant::Value { kind: None };
        assert_eq!(qdrant_value_to_json(v), serde_json::Value::Null);
    }

    #[tokio::test]
    async fn unreachable_server_errors() {
        let backend = QdrantBackend::new("http://127.0.0.1:1").unwrap();
        assert!(backend.collection_exists("docs").await.is_err());
    }
}
