//! Test-only chat and embedding providers.

use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{
    ChatProvider, ChatResponse, ChatStream, Embedder, Message, ToolDefinition,
};

/// Scripted chat provider: each call consumes the next queued turn.
#[derive(Debug, Clone)]
pub struct MockChat {
    turns: Arc<Mutex<VecDeque<ChatResponse>>>,
    pub default_response: String,
    pub fail: bool,
    pub streaming: bool,
    pub tool_use: bool,
}

impl Default for MockChat {
    fn default() -> Self {
        Self {
            turns: Arc::new(Mutex::new(VecDeque::new())),
            default_response: "mock response".into(),
            fail: false,
            streaming: false,
            tool_use: false,
        }
    }
}

impl MockChat {
    #[must_use]
    pub fn with_turns(turns: Vec<ChatResponse>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns.into())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    #[must_use]
    pub fn with_tool_use(mut self) -> Self {
        self.tool_use = true;
        self
    }

    fn next_turn(&self) -> Option<ChatResponse> {
        self.turns.lock().unwrap().pop_front()
    }
}

impl ChatProvider for MockChat {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        if self.fail {
            return Err(LlmError::Other("mock chat error".into()));
        }
        match self.next_turn() {
            None => Ok(self.default_response.clone()),
            Some(ChatResponse::Text(t)) => Ok(t),
            Some(ChatResponse::ToolUse { .. }) => Err(LlmError::Other(
                "scripted tool-use turn consumed through plain chat".into(),
            )),
        }
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let response = self.chat(messages).await?;
        let chunks: Vec<_> = response.chars().map(|c| Ok(c.to_string())).collect();
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    async fn chat_with_tools(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        if self.fail {
            return Err(LlmError::Other("mock chat error".into()));
        }
        Ok(self
            .next_turn()
            .unwrap_or_else(|| ChatResponse::Text(self.default_response.clone())))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn supports_tool_use(&self) -> bool {
        self.tool_use
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

/// Deterministic bag-of-tokens embedder: each token hashes into one of `dim`
/// buckets, the vector is L2-normalized. Identical texts always embed
/// identically, and texts sharing tokens have positive cosine similarity.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dim: usize,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dim: 64 }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hasher.finish() % self.dim as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Embedder for MockEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(self.embed_one(text))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Role, ToolUseRequest};
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn scripted_turns_consumed_in_order() {
        let chat = MockChat::with_turns(vec![
            ChatResponse::Text("first".into()),
            ChatResponse::Text("second".into()),
        ]);
        let msgs = [Message::text(Role::User, "q")];
        assert_eq!(chat.chat(&msgs).await.unwrap(), "first");
        assert_eq!(chat.chat(&msgs).await.unwrap(), "second");
        assert_eq!(chat.chat(&msgs).await.unwrap(), "mock response");
    }

    #[tokio::test]
    async fn chat_with_tools_returns_tool_use_turn() {
        let chat = MockChat::with_turns(vec![ChatResponse::ToolUse {
            text: None,
            tool_calls: vec![ToolUseRequest {
                id: "call_1".into(),
                name: "retrieve_context".into(),
                input: serde_json::json!({"query": "x"}),
            }],
        }])
        .with_tool_use();
        let resp = chat.chat_with_tools(&[], &[]).await.unwrap();
        assert!(matches!(resp, ChatResponse::ToolUse { .. }));
    }

    #[tokio::test]
    async fn failing_chat_errors() {
        let chat = MockChat::failing();
        assert!(chat.chat(&[]).await.is_err());
        assert!(chat.chat_with_tools(&[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn stream_concatenates_to_chat_output() {
        let chat = MockChat::with_turns(vec![ChatResponse::Text("hello".into())]);
        let mut stream = chat.chat_stream(&[]).await.unwrap();
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            out.push_str(&chunk.unwrap());
        }
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn embed_is_deterministic() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed_query("the sky is blue").await.unwrap();
        let b = embedder.embed_query("the sky is blue").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embed_query_matches_batch_entry() {
        let embedder = MockEmbedder::default();
        let single = embedder.embed_query("hello world").await.unwrap();
        let batch = embedder
            .embed_documents(&["hello world".to_owned()])
            .await
            .unwrap();
        assert_eq!(single, batch[0]);
    }

    #[tokio::test]
    async fn embed_documents_preserves_length_and_dim() {
        let embedder = MockEmbedder::new(32);
        let texts = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        let out = embedder.embed_documents(&texts).await.unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.len() == 32));
    }

    #[tokio::test]
    async fn shared_tokens_give_positive_similarity() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed_query("sky color").await.unwrap();
        let b = embedder.embed_query("the sky is blue").await.unwrap();
        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!(dot > 0.0);
    }
}
