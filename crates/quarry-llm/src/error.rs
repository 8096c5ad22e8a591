#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("SSE parse error: {0}")]
    SseParse(String),

    #[error("embeddings not supported by {provider}")]
    EmbedUnsupported { provider: String },

    #[error("native tool calls not supported by {provider}")]
    ToolUseUnsupported { provider: String },

    #[error("provider '{0}' is not supported")]
    UnsupportedProvider(String),

    #[error("missing credential for provider '{provider}': set {env}")]
    MissingCredential { provider: String, env: String },

    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
