use std::path::Path;

use serde::{Deserialize, Serialize};

use quarry_ingest::DataSource;
use quarry_mcp::ServerDecl;

use crate::prompts::DEFAULT_SYSTEM_PROMPT;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Provider(#[from] quarry_llm::LlmError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Store(#[from] quarry_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_owned()
}

fn default_max_steps() -> usize {
    10
}

fn default_k() -> usize {
    5
}

fn default_max_parallel_tools() -> usize {
    4
}

fn default_namespace() -> String {
    "default".to_owned()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

/// Folders skipped during ingestion when the config does not override them.
#[must_use]
pub fn default_ignore_folders() -> Vec<String> {
    [
        ".git",
        ".idea",
        ".vscode",
        ".cache",
        ".venv",
        "venv",
        "env",
        "node_modules",
        "__pycache__",
        "build",
        "dist",
        "target",
        ".pytest_cache",
        ".mypy_cache",
        ".ruff_cache",
        "logs",
        "tmp",
        "temp",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// Immutable per-pipeline agent configuration. Reconfiguring means building
/// a new pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Chat provider name; one of the closed provider set.
    pub provider: String,
    /// Chat model name, as the provider knows it.
    pub model: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Maximum model-call round trips per question.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Retrieval fan-out: documents returned per tool call.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Cap on concurrently executing tool calls within one step.
    #[serde(default = "default_max_parallel_tools")]
    pub max_parallel_tools: usize,
    #[serde(default)]
    pub mcp_servers: Vec<ServerDecl>,
    #[serde(default = "default_ignore_folders")]
    pub ignore_folders: Vec<String>,
    #[serde(default)]
    pub knowledge_base: Vec<DataSource>,
}

impl AgentConfig {
    /// Minimal config for the given provider and model, everything else at
    /// its default.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_base: None,
            api_key: None,
            system_prompt: default_system_prompt(),
            max_steps: default_max_steps(),
            k: default_k(),
            max_parallel_tools: default_max_parallel_tools(),
            mcp_servers: Vec::new(),
            ignore_folders: default_ignore_folders(),
            knowledge_base: Vec::new(),
        }
    }
}

/// Vector store and embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Embedding provider name; one of the closed provider set.
    pub provider: String,
    pub embedding_model: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Qdrant endpoint; omitted means the in-process memory backend.
    #[serde(default)]
    pub qdrant_url: Option<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl StoreConfig {
    #[must_use]
    pub fn new(provider: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            embedding_model: embedding_model.into(),
            api_base: None,
            api_key: None,
            namespace: default_namespace(),
            qdrant_url: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Top-level config file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub agent: AgentConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Parse a TOML config. Unknown keys are a hard error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed or unknown-key input.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load and parse a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` or `ConfigError::Parse`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[agent]
provider = "ollama"
model = "llama3"

[store]
provider = "ollama"
embedding_model = "nomic-embed-text"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.agent.max_steps, 10);
        assert_eq!(config.agent.k, 5);
        assert_eq!(config.agent.max_parallel_tools, 4);
        assert_eq!(config.store.namespace, "default");
        assert_eq!(config.store.chunk_size, 1000);
        assert_eq!(config.store.chunk_overlap, 200);
        assert!(config.store.qdrant_url.is_none());
        assert!(config.agent.ignore_folders.contains(&".git".to_owned()));
    }

    #[test]
    fn unknown_agent_key_is_rejected() {
        let input = r#"
[agent]
provider = "ollama"
model = "llama3"
temprature = 0.5

[store]
provider = "ollama"
embedding_model = "nomic-embed-text"
"#;
        let err = Config::from_toml(input).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("temprature"));
    }

    #[test]
    fn unknown_top_level_section_is_rejected() {
        let input = format!("{MINIMAL}\n[telemetry]\nenabled = true\n");
        assert!(Config::from_toml(&input).is_err());
    }

    #[test]
    fn knowledge_base_sources_parse() {
        let input = r#"
[agent]
provider = "ollama"
model = "llama3"

[[agent.knowledge_base]]
type = "folder"
path = "./docs"

[[agent.knowledge_base]]
type = "repository"
url = "https://github.com/acme/widgets"
branch = "main"

[store]
provider = "ollama"
embedding_model = "nomic-embed-text"
"#;
        let config = Config::from_toml(input).unwrap();
        assert_eq!(config.agent.knowledge_base.len(), 2);
    }

    #[test]
    fn mcp_servers_parse() {
        let input = r#"
[agent]
provider = "openai"
model = "gpt-4o"

[[agent.mcp_servers]]
url = "http://localhost:9000/mcp"

[[agent.mcp_servers]]
command = "mcp-filesystem"
args = ["--root", "/data"]

[store]
provider = "openai"
embedding_model = "text-embedding-3-small"
"#;
        let config = Config::from_toml(input).unwrap();
        assert_eq!(config.agent.mcp_servers.len(), 2);
        assert_eq!(config.agent.mcp_servers[1].args.len(), 2);
    }

    #[test]
    fn builder_defaults_match_serde_defaults() {
        let built = AgentConfig::new("ollama", "llama3");
        let parsed = Config::from_toml(MINIMAL).unwrap().agent;
        assert_eq!(built.max_steps, parsed.max_steps);
        assert_eq!(built.k, parsed.k);
        assert_eq!(built.system_prompt, parsed.system_prompt);
    }
}
