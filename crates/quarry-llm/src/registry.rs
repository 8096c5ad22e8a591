//! Provider registry: resolve a provider name + model name into a concrete
//! chat or embedding client.

use std::str::FromStr;

use crate::compatible::{CompatibleChat, CompatibleEmbedder};
use crate::error::LlmError;
#[cfg(feature = "local-embeddings")]
use crate::fastembed::FastEmbedder;
#[cfg(feature = "mock")]
use crate::mock::{MockChat, MockEmbedder};
use crate::ollama::{DEFAULT_OLLAMA_URL, OllamaChat, OllamaEmbedder};
use crate::openai::{DEFAULT_OPENAI_URL, OpenAiChat, OpenAiEmbedder};
use crate::provider::{
    ChatProvider, ChatResponse, ChatStream, Embedder, Message, ToolDefinition,
};

pub const DEFAULT_MISTRAL_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_LMSTUDIO_URL: &str = "http://localhost:1234/v1";
pub const DEFAULT_VLLM_URL: &str = "http://localhost:8000/v1";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAi,
    Mistral,
    Gemini,
    LmStudio,
    Vllm,
    /// On-device embeddings; has no chat API.
    #[cfg(feature = "local-embeddings")]
    Local,
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            "mistral" => Ok(Self::Mistral),
            "gemini" | "googlegemini" => Ok(Self::Gemini),
            "lmstudio" => Ok(Self::LmStudio),
            "vllm" => Ok(Self::Vllm),
            #[cfg(feature = "local-embeddings")]
            "local" => Ok(Self::Local),
            _ => Err(LlmError::UnsupportedProvider(s.to_owned())),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Mistral => "mistral",
            Self::Gemini => "gemini",
            Self::LmStudio => "lmstudio",
            Self::Vllm => "vllm",
            #[cfg(feature = "local-embeddings")]
            Self::Local => "local",
        };
        f.write_str(name)
    }
}

/// Connection options shared by chat and embedding resolution.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

fn require_key(
    options: &ProviderOptions,
    provider: Provider,
    env: &str,
) -> Result<String, LlmError> {
    if let Some(ref key) = options.api_key {
        return Ok(key.clone());
    }
    std::env::var(env).map_err(|_| LlmError::MissingCredential {
        provider: provider.to_string(),
        env: env.to_owned(),
    })
}

fn base_url(options: &ProviderOptions, default: &str) -> String {
    options
        .base_url
        .clone()
        .unwrap_or_else(|| default.to_owned())
}

/// Resolve a chat provider. Fails fast on unknown providers and missing
/// credentials so pipeline construction surfaces configuration errors
/// before the first request.
///
/// # Errors
///
/// Returns `UnsupportedProvider` or `MissingCredential`.
pub fn resolve_chat(
    provider: Provider,
    model: &str,
    options: &ProviderOptions,
) -> Result<AnyChat, LlmError> {
    match provider {
        Provider::Ollama => Ok(AnyChat::Ollama(OllamaChat::new(
            &base_url(options, DEFAULT_OLLAMA_URL),
            model.to_owned(),
        ))),
        Provider::OpenAi => {
            let key = require_key(options, provider, "OPENAI_API_KEY")?;
            Ok(AnyChat::OpenAi(OpenAiChat::new(
                key,
                base_url(options, DEFAULT_OPENAI_URL),
                model.to_owned(),
            )))
        }
        Provider::Mistral => {
            let key = require_key(options, provider, "MISTRAL_API_KEY")?;
            Ok(AnyChat::Compatible(CompatibleChat::new(
                "mistral".into(),
                key,
                base_url(options, DEFAULT_MISTRAL_URL),
                model.to_owned(),
            )))
        }
        Provider::Gemini => {
            let key = require_key(options, provider, "GEMINI_API_KEY")?;
            Ok(AnyChat::Compatible(CompatibleChat::new(
                "gemini".into(),
                key,
                base_url(options, DEFAULT_GEMINI_URL),
                model.to_owned(),
            )))
        }
        Provider::LmStudio => Ok(AnyChat::Compatible(CompatibleChat::new(
            "lmstudio".into(),
            "not-needed".into(),
            base_url(options, DEFAULT_LMSTUDIO_URL),
            model.to_owned(),
        ))),
        Provider::Vllm => Ok(AnyChat::Compatible(CompatibleChat::new(
            "vllm".into(),
            options.api_key.clone().unwrap_or_else(|| "not-needed".into()),
            base_url(options, DEFAULT_VLLM_URL),
            model.to_owned(),
        ))),
        #[cfg(feature = "local-embeddings")]
        Provider::Local => Err(LlmError::UnsupportedProvider(
            "local (embeddings-only, no chat API)".into(),
        )),
    }
}

/// Resolve an embedding provider. May load a local model file (and therefore
/// block) so that construction fails fast.
///
/// # Errors
///
/// Returns `UnsupportedProvider`, `MissingCredential`, or `ModelLoad`.
pub fn resolve_embedder(
    provider: Provider,
    model: &str,
    options: &ProviderOptions,
) -> Result<AnyEmbedder, LlmError> {
    match provider {
        Provider::Ollama => Ok(AnyEmbedder::Ollama(OllamaEmbedder::new(
            &base_url(options, DEFAULT_OLLAMA_URL),
            model.to_owned(),
        ))),
        Provider::OpenAi => {
            let key = require_key(options, provider, "OPENAI_API_KEY")?;
            Ok(AnyEmbedder::OpenAi(OpenAiEmbedder::new(
                key,
                base_url(options, DEFAULT_OPENAI_URL),
                model.to_owned(),
            )))
        }
        Provider::Mistral => {
            let key = require_key(options, provider, "MISTRAL_API_KEY")?;
            Ok(AnyEmbedder::Compatible(CompatibleEmbedder::new(
                "mistral".into(),
                key,
                base_url(options, DEFAULT_MISTRAL_URL),
                model.to_owned(),
            )))
        }
        Provider::Gemini => {
            let key = require_key(options, provider, "GEMINI_API_KEY")?;
            Ok(AnyEmbedder::Compatible(CompatibleEmbedder::new(
                "gemini".into(),
                key,
                base_url(options, DEFAULT_GEMINI_URL),
                model.to_owned(),
            )))
        }
        Provider::LmStudio => Ok(AnyEmbedder::Compatible(CompatibleEmbedder::new(
            "lmstudio".into(),
            "not-needed".into(),
            base_url(options, DEFAULT_LMSTUDIO_URL),
            model.to_owned(),
        ))),
        Provider::Vllm => Ok(AnyEmbedder::Compatible(CompatibleEmbedder::new(
            "vllm".into(),
            options.api_key.clone().unwrap_or_else(|| "not-needed".into()),
            base_url(options, DEFAULT_VLLM_URL),
            model.to_owned(),
        ))),
        #[cfg(feature = "local-embeddings")]
        Provider::Local => Ok(AnyEmbedder::Local(FastEmbedder::new(model)?)),
    }
}

/// Generates a match over all `AnyChat` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_chat {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyChat::Ollama($p) => $expr,
            AnyChat::OpenAi($p) => $expr,
            AnyChat::Compatible($p) => $expr,
            #[cfg(feature = "mock")]
            AnyChat::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyChat {
    Ollama(OllamaChat),
    OpenAi(OpenAiChat),
    Compatible(CompatibleChat),
    #[cfg(feature = "mock")]
    Mock(MockChat),
}

impl ChatProvider for AnyChat {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        delegate_chat!(self, |p| p.chat(messages).await)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        delegate_chat!(self, |p| p.chat_stream(messages).await)
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        delegate_chat!(self, |p| p.chat_with_tools(messages, tools).await)
    }

    fn supports_streaming(&self) -> bool {
        delegate_chat!(self, |p| p.supports_streaming())
    }

    fn supports_tool_use(&self) -> bool {
        delegate_chat!(self, |p| p.supports_tool_use())
    }

    fn name(&self) -> &str {
        delegate_chat!(self, |p| p.name())
    }
}

macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Ollama($p) => $expr,
            AnyEmbedder::OpenAi($p) => $expr,
            AnyEmbedder::Compatible($p) => $expr,
            #[cfg(feature = "local-embeddings")]
            AnyEmbedder::Local($p) => $expr,
            #[cfg(feature = "mock")]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Ollama(OllamaEmbedder),
    OpenAi(OpenAiEmbedder),
    Compatible(CompatibleEmbedder),
    #[cfg(feature = "local-embeddings")]
    Local(FastEmbedder),
    #[cfg(feature = "mock")]
    Mock(MockEmbedder),
}

impl Embedder for AnyEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        delegate_embedder!(self, |p| p.embed_documents(texts).await)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        delegate_embedder!(self, |p| p.embed_query(text).await)
    }

    fn name(&self) -> &str {
        delegate_embedder!(self, |p| p.name())
    }
}
