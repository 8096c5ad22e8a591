use std::str::FromStr;
use std::sync::Arc;

use quarry_ingest::{IngestReport, IngestionPipeline};
use quarry_llm::provider::ChatStream;
use quarry_llm::registry::{
    AnyChat, AnyEmbedder, Provider, ProviderOptions, resolve_chat, resolve_embedder,
};
use quarry_store::{DualIndexStore, MemoryBackend, QdrantBackend, VectorBackend};
use quarry_tools::{augment_with_namespaces, content_search_tool, symbol_search_tool};

use crate::config::{AgentConfig, ConfigError, StoreConfig};
use crate::error::AgentError;
use crate::orchestrator::AgentOrchestrator;

/// The assembled RAG pipeline: a dual index, its ingestion side, and the
/// agentic reasoning loop over it.
///
/// Construction resolves every provider up front and fails fast on
/// configuration errors. The configuration is immutable afterwards; to
/// reconfigure, build a new pipeline.
pub struct RagPipeline {
    config: AgentConfig,
    store: Arc<DualIndexStore<AnyEmbedder>>,
    ingestion: IngestionPipeline<AnyEmbedder>,
    orchestrator: AgentOrchestrator<AnyChat>,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("provider", &self.config.provider)
            .field("model", &self.config.model)
            .field("namespace", &self.store.namespace())
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Resolve providers, open the store backend, and wire the retrieval
    /// tools.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown providers, missing credentials, or
    /// an unreachable store backend.
    pub async fn new(agent: AgentConfig, store_config: StoreConfig) -> Result<Self, ConfigError> {
        let chat_provider = Provider::from_str(&agent.provider)?;
        let chat = resolve_chat(
            chat_provider,
            &agent.model,
            &ProviderOptions {
                base_url: agent.api_base.clone(),
                api_key: agent.api_key.clone(),
            },
        )?;

        let embed_provider = Provider::from_str(&store_config.provider)?;
        let embedder = resolve_embedder(
            embed_provider,
            &store_config.embedding_model,
            &ProviderOptions {
                base_url: store_config.api_base.clone(),
                api_key: store_config.api_key.clone(),
            },
        )?;

        let backend: Arc<dyn VectorBackend> = match &store_config.qdrant_url {
            Some(url) => Arc::new(QdrantBackend::new(url)?),
            None => Arc::new(MemoryBackend::new()),
        };

        let store = Arc::new(DualIndexStore::new(
            backend,
            embedder,
            store_config.namespace.clone(),
        ));

        let mut local_tools = vec![
            content_search_tool(Arc::clone(&store), agent.k),
            symbol_search_tool(Arc::clone(&store), agent.k),
        ];
        augment_with_namespaces(&mut local_tools, &store).await;

        let ingestion = IngestionPipeline::new(
            Arc::clone(&store),
            store_config.chunk_size,
            store_config.chunk_overlap,
        );

        let orchestrator = AgentOrchestrator::new(
            chat,
            local_tools.into_iter().map(Arc::new).collect(),
            agent.mcp_servers.clone(),
            agent.system_prompt.clone(),
            agent.max_steps,
            agent.max_parallel_tools,
        );

        Ok(Self {
            config: agent,
            store,
            ingestion,
            orchestrator,
        })
    }

    /// Ingest every configured knowledge-base source.
    ///
    /// # Errors
    ///
    /// Returns the first source-level failure (clone, walk, or store
    /// write); per-file processor failures are isolated inside each source.
    pub async fn build(&self) -> Result<IngestReport, AgentError> {
        let mut total = IngestReport::default();
        for source in &self.config.knowledge_base {
            let report = self
                .ingestion
                .ingest(source, &self.config.ignore_folders)
                .await?;
            total.files_processed += report.files_processed;
            total.files_failed += report.files_failed;
            total.files_skipped += report.files_skipped;
            total.chunks += report.chunks;
            total.symbols += report.symbols;
        }
        Ok(total)
    }

    /// Answer a question through the reasoning loop.
    ///
    /// # Errors
    ///
    /// See [`AgentOrchestrator::generate`].
    pub async fn generate(&self, question: &str) -> Result<String, AgentError> {
        self.orchestrator.generate(question).await
    }

    /// Stream a single-turn answer.
    ///
    /// # Errors
    ///
    /// See [`AgentOrchestrator::generate_stream`].
    pub async fn generate_stream(&self, question: &str) -> Result<ChatStream, AgentError> {
        self.orchestrator.generate_stream(question).await
    }

    #[must_use]
    pub fn store(&self) -> &Arc<DualIndexStore<AnyEmbedder>> {
        &self.store
    }

    #[must_use]
    pub fn ingestion(&self) -> &IngestionPipeline<AnyEmbedder> {
        &self.ingestion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_provider_fails_at_construction() {
        let agent = AgentConfig::new("bedrock", "some-model");
        let store = StoreConfig::new("ollama", "nomic-embed-text");
        let err = RagPipeline::new(agent, store).await.unwrap_err();
        assert!(err.to_string().contains("bedrock"));
    }

    #[tokio::test]
    async fn unknown_embedding_provider_fails_at_construction() {
        let agent = AgentConfig::new("ollama", "llama3");
        let store = StoreConfig::new("pinecone", "embed-model");
        let err = RagPipeline::new(agent, store).await.unwrap_err();
        assert!(err.to_string().contains("pinecone"));
    }

    #[tokio::test]
    async fn missing_credential_fails_at_construction() {
        if std::env::var("MISTRAL_API_KEY").is_ok() {
            return;
        }
        let agent = AgentConfig::new("mistral", "mistral-large-latest");
        let store = StoreConfig::new("ollama", "nomic-embed-text");
        let err = RagPipeline::new(agent, store).await.unwrap_err();
        assert!(err.to_string().contains("MISTRAL_API_KEY"));
    }

    #[tokio::test]
    async fn memory_backend_pipeline_constructs() {
        let agent = AgentConfig::new("ollama", "llama3");
        let store = StoreConfig::new("ollama", "nomic-embed-text");
        let pipeline = RagPipeline::new(agent, store).await.unwrap();
        assert_eq!(pipeline.store().namespace(), "default");
    }

    #[tokio::test]
    async fn build_with_empty_knowledge_base_is_a_noop() {
        let agent = AgentConfig::new("ollama", "llama3");
        let store = StoreConfig::new("ollama", "nomic-embed-text");
        let pipeline = RagPipeline::new(agent, store).await.unwrap();
        let report = pipeline.build().await.unwrap();
        assert_eq!(report, IngestReport::default());
    }
}
