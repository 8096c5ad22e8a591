//! On-device embeddings via fastembed (ONNX runtime).
//!
//! The model is downloaded and loaded at construction so misconfiguration
//! fails at pipeline build time, not on the first request.

use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::LlmError;
use crate::provider::Embedder;

pub const DEFAULT_LOCAL_MODEL: &str = "all-MiniLM-L6-v2";

#[derive(Clone)]
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

fn select_model(name: &str) -> Result<EmbeddingModel, LlmError> {
    match name {
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" | "nomic-ai/nomic-embed-text-v1.5" => {
            Ok(EmbeddingModel::NomicEmbedTextV15)
        }
        other => Err(LlmError::ModelLoad(format!(
            "unknown local embedding model '{other}'"
        ))),
    }
}

impl FastEmbedder {
    /// Load the named local embedding model, downloading it if necessary.
    ///
    /// # Errors
    ///
    /// Returns `ModelLoad` if the model name is unknown or loading fails.
    pub fn new(model_name: &str) -> Result<Self, LlmError> {
        let model = select_model(model_name)?;
        let embedding = TextEmbedding::try_new(
            InitOptions::new(model).with_show_download_progress(false),
        )
        .map_err(|e| LlmError::ModelLoad(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(embedding)),
            model_name: model_name.to_owned(),
        })
    }

    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|e| LlmError::Other(format!("embedding model lock poisoned: {e}")))?;
            guard
                .embed(texts, None)
                .map_err(|e| LlmError::Other(format!("local embedding failed: {e}")))
        })
        .await
        .map_err(|e| LlmError::Other(format!("embedding task panicked: {e}")))?
    }
}

impl Embedder for FastEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_blocking(texts.to_vec()).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_blocking(vec![text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse {
                provider: "fastembed".into(),
            })
    }

    fn name(&self) -> &str {
        "fastembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_known_model() {
        assert!(select_model("all-MiniLM-L6-v2").is_ok());
        assert!(select_model("BAAI/bge-small-en-v1.5").is_ok());
    }

    #[test]
    fn select_unknown_model_errors() {
        let err = select_model("not-a-model").unwrap_err();
        assert!(err.to_string().contains("not-a-model"));
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn integration_embed_query_matches_batch() {
        let embedder = FastEmbedder::new(DEFAULT_LOCAL_MODEL).unwrap();
        let single = embedder.embed_query("hello world").await.unwrap();
        let batch = embedder
            .embed_documents(&["hello world".to_owned()])
            .await
            .unwrap();
        assert_eq!(single, batch[0]);
    }
}
