use std::fmt;

use crate::error::LlmError;
use crate::openai::{OpenAiChat, OpenAiEmbedder};
use crate::provider::{
    ChatProvider, ChatResponse, ChatStream, Embedder, Message, ToolDefinition,
};

/// Chat adapter for vendors exposing an OpenAI-compatible API
/// (Mistral, LM Studio, vLLM, Gemini's compatibility endpoint).
#[derive(Clone)]
pub struct CompatibleChat {
    inner: OpenAiChat,
    provider_name: String,
}

impl CompatibleChat {
    #[must_use]
    pub fn new(provider_name: String, api_key: String, base_url: String, model: String) -> Self {
        Self {
            inner: OpenAiChat::new(api_key, base_url, model),
            provider_name,
        }
    }
}

impl fmt::Debug for CompatibleChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompatibleChat")
            .field("provider_name", &self.provider_name)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl ChatProvider for CompatibleChat {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.inner.chat(messages).await
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        self.inner.chat_stream(messages).await
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        self.inner.chat_with_tools(messages, tools).await
    }

    fn supports_streaming(&self) -> bool {
        self.inner.supports_streaming()
    }

    fn supports_tool_use(&self) -> bool {
        self.inner.supports_tool_use()
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

/// Embedding adapter for vendors exposing an OpenAI-compatible `/embeddings`.
#[derive(Clone)]
pub struct CompatibleEmbedder {
    inner: OpenAiEmbedder,
    provider_name: String,
}

impl CompatibleEmbedder {
    #[must_use]
    pub fn new(provider_name: String, api_key: String, base_url: String, model: String) -> Self {
        Self {
            inner: OpenAiEmbedder::new(api_key, base_url, model),
            provider_name,
        }
    }
}

impl fmt::Debug for CompatibleEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompatibleEmbedder")
            .field("provider_name", &self.provider_name)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl Embedder for CompatibleEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.inner.embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.inner.embed_query(text).await
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}
