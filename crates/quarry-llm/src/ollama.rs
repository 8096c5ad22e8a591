use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::{ChatProvider, ChatStream, Embedder, Message, Role};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Chat against a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: Ollama,
    model: String,
}

impl OllamaChat {
    #[must_use]
    pub fn new(base_url: &str, model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
        }
    }

    /// Check that the Ollama server is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client.list_local_models().await.map_err(|e| {
            LlmError::Other(format!("failed to connect to Ollama — is it running? {e}"))
        })?;
        Ok(())
    }
}

impl ChatProvider for OllamaChat {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), ollama_messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama chat request failed: {e}")))?;

        Ok(response.message.content)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), ollama_messages);

        let stream = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama streaming request failed: {e}")))?;

        let mapped = stream.map(|item| match item {
            Ok(response) => Ok(response.message.content),
            Err(()) => Err(LlmError::Other("Ollama stream chunk failed".into())),
        });

        Ok(Box::pin(mapped))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

/// Embeddings against a local Ollama server.
///
/// Both the batch and the query path go through the same `/api/embed`
/// endpoint so `embed_query(t)` is numerically identical to
/// `embed_documents(&[t])[0]`.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new(base_url: &str, model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
        }
    }

    async fn embed_batch(&self, input: EmbeddingsInput) -> Result<Vec<Vec<f32>>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), input);
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?;
        Ok(response.embeddings)
    }
}

impl Embedder for OllamaEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self
            .embed_batch(EmbeddingsInput::Multiple(texts.to_vec()))
            .await?;
        if embeddings.len() != texts.len() {
            return Err(LlmError::Other(format!(
                "Ollama returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }
        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_batch(EmbeddingsInput::Multiple(vec![text.to_owned()]))
            .await?
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse {
                provider: "ollama".into(),
            })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    let text = msg.flat_content().to_string();
    match msg.role {
        Role::System => ChatMessage::system(text),
        Role::Assistant => ChatMessage::assistant(text),
        // Ollama has no first-class tool role in the plain chat path;
        // tool results are carried as user turns.
        Role::User | Role::Tool => ChatMessage::user(text),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_with_port() {
        let (host, port) = parse_host_port("http://localhost:11434");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_without_port() {
        let (host, port) = parse_host_port("http://localhost");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_custom_port() {
        let (host, port) = parse_host_port("http://192.168.1.20:8080");
        assert_eq!(host, "http://192.168.1.20");
        assert_eq!(port, 8080);
    }

    #[test]
    fn parse_host_port_trailing_slash() {
        let (host, port) = parse_host_port("http://localhost:11434/");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_invalid_port_falls_back() {
        let (host, port) = parse_host_port("http://localhost:notaport");
        assert_eq!(host, "http://localhost:notaport");
        assert_eq!(port, 11434);
    }

    #[test]
    fn convert_message_roles() {
        let user = convert_message(&Message::text(Role::User, "hello"));
        assert_eq!(user.content, "hello");

        let tool = convert_message(&Message::text(Role::Tool, "result"));
        assert_eq!(
            tool.role,
            ollama_rs::generation::chat::MessageRole::User
        );
    }

    #[test]
    fn chat_name_and_streaming() {
        let chat = OllamaChat::new(DEFAULT_OLLAMA_URL, "llama3".into());
        assert_eq!(chat.name(), "ollama");
        assert!(chat.supports_streaming());
        assert!(!chat.supports_tool_use());
    }

    #[tokio::test]
    async fn embed_documents_empty_is_empty_without_network() {
        // Unreachable endpoint: the empty-input short circuit must not touch it.
        let embedder = OllamaEmbedder::new("http://127.0.0.1:1", "nomic-embed-text".into());
        let out = embedder.embed_documents(&[]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn chat_with_unreachable_endpoint_errors() {
        let chat = OllamaChat::new("http://127.0.0.1:1", "llama3".into());
        let messages = vec![Message::text(Role::User, "hello")];
        assert!(chat.chat(&messages).await.is_err());
    }

    #[tokio::test]
    async fn embed_with_unreachable_endpoint_errors() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:1", "nomic-embed-text".into());
        assert!(embedder.embed_query("text").await.is_err());
    }

    #[tokio::test]
    async fn health_check_unreachable_errors() {
        let chat = OllamaChat::new("http://127.0.0.1:1", "llama3".into());
        let err = chat.health_check().await.unwrap_err();
        assert!(err.to_string().contains("Ollama"));
    }

    #[tokio::test]
    #[ignore = "requires a running Ollama instance"]
    async fn integration_embed_query_matches_batch() {
        let embedder = OllamaEmbedder::new(DEFAULT_OLLAMA_URL, "nomic-embed-text".into());
        let single = embedder.embed_query("hello world").await.unwrap();
        let batch = embedder
            .embed_documents(&["hello world".to_owned()])
            .await
            .unwrap();
        assert_eq!(single, batch[0]);
    }
}
