use std::collections::HashMap;
use std::sync::Arc;

use quarry_llm::Embedder;
use uuid::Uuid;

use crate::backend::{MetadataFilter, VectorBackend, VectorPoint};
use crate::error::StoreError;
use crate::types::{Chunk, Document, SymbolRecord};

const CLASS_SUFFIX: &str = "_classes";
const TEXT_KEY: &str = "text";

/// Persistent dual index: a content collection and a symbol collection per
/// logical namespace, with one embedding model bound per store instance.
///
/// The two collections are independent; writing to one never affects the
/// other. Adds embed the whole batch in one provider call and write it as a
/// single backend upsert, so a failed embed leaves the store untouched and a
/// failed write applies nothing.
pub struct DualIndexStore<E: Embedder> {
    backend: Arc<dyn VectorBackend>,
    embedder: E,
    namespace: String,
}

impl<E: Embedder> std::fmt::Debug for DualIndexStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualIndexStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl<E: Embedder> DualIndexStore<E> {
    #[must_use]
    pub fn new(backend: Arc<dyn VectorBackend>, embedder: E, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            embedder,
            namespace: namespace.into(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn content_collection(&self, namespace: Option<&str>) -> String {
        namespace.unwrap_or(&self.namespace).to_owned()
    }

    fn class_collection(&self, namespace: Option<&str>) -> String {
        format!("{}{CLASS_SUFFIX}", namespace.unwrap_or(&self.namespace))
    }

    /// Embed and store content chunks. No-op on empty input.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the backend write fails; in either
    /// case nothing is persisted.
    pub async fn add_documents(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;

        let points = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut payload: HashMap<String, serde_json::Value> = HashMap::new();
                payload.insert(TEXT_KEY.to_owned(), serde_json::json!(chunk.text));
                payload.insert("source".to_owned(), serde_json::json!(chunk.source));
                payload.insert(
                    "sequence_index".to_owned(),
                    serde_json::json!(chunk.sequence_index),
                );
                for (k, v) in &chunk.extra {
                    payload.insert(k.clone(), serde_json::json!(v));
                }
                VectorPoint {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    payload,
                }
            })
            .collect::<Vec<_>>();

        let collection = self.content_collection(None);
        self.write_points(&collection, points).await?;
        tracing::info!(
            collection,
            count = chunks.len(),
            "added document chunks to content collection"
        );
        Ok(())
    }

    /// Embed and store symbol records. No-op on empty input.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the backend write fails.
    pub async fn add_class_documents(&self, symbols: &[SymbolRecord]) -> Result<(), StoreError> {
        if symbols.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = symbols.iter().map(|s| s.text.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;

        let points = symbols
            .iter()
            .zip(vectors)
            .map(|(symbol, vector)| {
                let mut payload: HashMap<String, serde_json::Value> = HashMap::new();
                payload.insert(TEXT_KEY.to_owned(), serde_json::json!(symbol.text));
                payload.insert("source".to_owned(), serde_json::json!(symbol.source));
                payload.insert(
                    "symbol_name".to_owned(),
                    serde_json::json!(symbol.symbol_name),
                );
                VectorPoint {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    payload,
                }
            })
            .collect::<Vec<_>>();

        let collection = self.class_collection(None);
        self.write_points(&collection, points).await?;
        tracing::info!(
            collection,
            count = symbols.len(),
            "added symbol records to class collection"
        );
        Ok(())
    }

    async fn write_points(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<(), StoreError> {
        let vector_size = points
            .first()
            .map(|p| p.vector.len() as u64)
            .unwrap_or_default();
        self.backend
            .ensure_collection(collection, vector_size)
            .await?;
        self.backend.upsert(collection, points).await
    }

    /// Nearest content documents for `query`, best match first.
    ///
    /// An explicit `namespace` targets that collection instead of the
    /// store's default, creating it lazily if absent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the requested namespace cannot be created, or
    /// an error if embedding or the search fails.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&HashMap<String, String>>,
        namespace: Option<&str>,
    ) -> Result<Vec<Document>, StoreError> {
        let collection = self.content_collection(namespace);
        self.search_collection(&collection, query, k, filter).await
    }

    /// Identical contract to [`similarity_search`](Self::similarity_search)
    /// against the symbol collection.
    ///
    /// # Errors
    ///
    /// Same as `similarity_search`.
    pub async fn similarity_search_class(
        &self,
        query: &str,
        k: usize,
        filter: Option<&HashMap<String, String>>,
        namespace: Option<&str>,
    ) -> Result<Vec<Document>, StoreError> {
        let collection = self.class_collection(namespace);
        self.search_collection(&collection, query, k, filter).await
    }

    async fn search_collection(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&HashMap<String, String>>,
    ) -> Result<Vec<Document>, StoreError> {
        let vector = self.embedder.embed_query(query).await?;

        if !self.backend.collection_exists(collection).await? {
            self.backend
                .ensure_collection(collection, vector.len() as u64)
                .await
                .map_err(|e| {
                    tracing::warn!(collection, "failed to create namespace lazily: {e}");
                    StoreError::NotFound(collection.to_owned())
                })?;
        }

        let metadata_filter = filter.map(MetadataFilter::from_map);
        let hits = self
            .backend
            .search(collection, vector, k as u64, metadata_filter)
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let mut text = String::new();
                let mut metadata = HashMap::new();
                for (key, value) in hit.payload {
                    if key == TEXT_KEY {
                        if let serde_json::Value::String(s) = value {
                            text = s;
                        }
                    } else {
                        let rendered = match value {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        metadata.insert(key, rendered);
                    }
                }
                Document { text, metadata }
            })
            .collect())
    }

    /// Namespaces known to the backend, with the symbol collections folded
    /// into their base namespace. `None` when the backend cannot enumerate.
    pub async fn list_namespaces(&self) -> Option<Vec<String>> {
        let lister = self.backend.namespace_lister()?;
        match lister.list_collections().await {
            Ok(collections) => {
                let mut namespaces: Vec<String> = collections
                    .into_iter()
                    .map(|c| {
                        c.strip_suffix(CLASS_SUFFIX)
                            .map_or(c.clone(), ToOwned::to_owned)
                    })
                    .collect();
                namespaces.sort();
                namespaces.dedup();
                Some(namespaces)
            }
            Err(e) => {
                tracing::debug!("namespace enumeration failed: {e}");
                None
            }
        }
    }
}
