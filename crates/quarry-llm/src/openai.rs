use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{
    ChatProvider, ChatResponse, ChatStream, Embedder, Message, MessagePart, Role, ToolDefinition,
    ToolUseRequest,
};
use crate::sse::completions_sse_to_stream;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Chat against an OpenAI-style `/chat/completions` endpoint, including
/// native tool calls and SSE streaming.
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Clone for OpenAiChat {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
        }
    }
}

impl OpenAiChat {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
        }
    }

    async fn send_request(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            tracing::error!("chat completions error {status}: {text}");
            return Err(LlmError::Other(format!(
                "chat completions request failed (status {status})"
            )));
        }

        let resp: ChatCompletionsResponse = serde_json::from_str(&text)?;
        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })
    }

    async fn send_stream_request(
        &self,
        messages: &[Message],
    ) -> Result<reqwest::Response, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.map_err(LlmError::Http)?;
            tracing::error!("streaming chat completions error {status}: {text}");
            return Err(LlmError::Other(format!(
                "streaming chat completions request failed (status {status})"
            )));
        }

        Ok(response)
    }
}

impl ChatProvider for OpenAiChat {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        match self.send_request(messages).await {
            Err(LlmError::RateLimited) => {
                tracing::warn!("rate limited, retrying in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.send_request(messages).await
            }
            other => other,
        }
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let response = match self.send_stream_request(messages).await {
            Err(LlmError::RateLimited) => {
                tracing::warn!("rate limited, retrying in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.send_stream_request(messages).await?
            }
            other => other?,
        };
        Ok(completions_sse_to_stream(response))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn supports_tool_use(&self) -> bool {
        true
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        let api_messages = convert_messages(messages);
        let api_tools: Vec<ApiTool> = tools
            .iter()
            .map(|t| ApiTool {
                r#type: "function",
                function: ApiFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect();

        let body = ToolChatRequest {
            model: &self.model,
            messages: &api_messages,
            tools: &api_tools,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            tracing::error!("tool chat completions error {status}: {text}");
            return Err(LlmError::Other(format!(
                "chat completions request failed (status {status})"
            )));
        }

        let resp: ChatCompletionsResponse = serde_json::from_str(&text)?;
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })?;

        let content = choice.message.content.unwrap_or_default();
        if let Some(tool_calls) = choice.message.tool_calls
            && !tool_calls.is_empty()
        {
            let text = if content.is_empty() {
                None
            } else {
                Some(content)
            };
            let calls = tool_calls
                .into_iter()
                .map(|tc| {
                    let input = serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
                    ToolUseRequest {
                        id: tc.id,
                        name: tc.function.name,
                        input,
                    }
                })
                .collect();
            return Ok(ChatResponse::ToolUse {
                text,
                tool_calls: calls,
            });
        }

        Ok(ChatResponse::Text(content))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

/// Embeddings against an OpenAI-style `/embeddings` endpoint. The whole
/// batch goes out as one array-input request.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Clone for OpenAiEmbedder {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
        }
    }
}

impl OpenAiEmbedder {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = EmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("embeddings error {status}: {text}");
            return Err(LlmError::Other(format!(
                "embeddings request failed (status {status})"
            )));
        }

        let mut resp: EmbeddingResponse = serde_json::from_str(&text)?;
        // The API may return entries out of order; index restores input order.
        resp.data.sort_by_key(|d| d.index);
        if resp.data.len() != texts.len() {
            return Err(LlmError::Other(format!(
                "embeddings response has {} entries for {} inputs",
                resp.data.len(),
                texts.len()
            )));
        }
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_batch(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_batch(&[text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage> {
    let mut result = Vec::with_capacity(messages.len());

    for msg in messages {
        let has_tool_parts = msg.parts.iter().any(|p| {
            matches!(
                p,
                MessagePart::ToolUse { .. } | MessagePart::ToolResult { .. }
            )
        });

        if !has_tool_parts {
            result.push(ApiMessage {
                role: role_str(msg.role).to_owned(),
                content: msg.flat_content().to_owned(),
                tool_calls: None,
                tool_call_id: None,
            });
            continue;
        }

        if msg.role == Role::Assistant {
            // Assistant turns with ToolUse parts map to the tool_calls field.
            let tool_calls: Vec<ApiToolCallOut> = msg
                .parts
                .iter()
                .filter_map(|p| match p {
                    MessagePart::ToolUse { id, name, input } => Some(ApiToolCallOut {
                        id: id.clone(),
                        r#type: "function".to_owned(),
                        function: ApiFunctionCall {
                            name: name.clone(),
                            arguments: serde_json::to_string(input).unwrap_or_default(),
                        },
                    }),
                    _ => None,
                })
                .collect();

            result.push(ApiMessage {
                role: "assistant".to_owned(),
                content: msg.flat_content().to_owned(),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            });
        } else {
            // ToolResult parts each become a role:"tool" message.
            for part in &msg.parts {
                match part {
                    MessagePart::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } => {
                        result.push(ApiMessage {
                            role: "tool".to_owned(),
                            content: content.clone(),
                            tool_calls: None,
                            tool_call_id: Some(tool_use_id.clone()),
                        });
                    }
                    MessagePart::Text { text } if !text.is_empty() => {
                        result.push(ApiMessage {
                            role: "user".to_owned(),
                            content: text.clone(),
                            tool_calls: None,
                            tool_call_id: None,
                        });
                    }
                    _ => {}
                }
            }
        }
    }

    result
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ToolChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    tools: &'a [ApiTool<'a>],
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCallOut>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct ApiTool<'a> {
    r#type: &'a str,
    function: ApiFunction<'a>,
}

#[derive(Serialize)]
struct ApiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize)]
struct ApiToolCallOut {
    id: String,
    r#type: String,
    function: ApiFunctionCall,
}

#[derive(Serialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCallIn>>,
}

#[derive(Deserialize)]
struct ApiToolCallIn {
    id: String,
    function: ApiToolCallFunction,
}

#[derive(Deserialize)]
struct ApiToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_chat(base_url: &str) -> OpenAiChat {
        OpenAiChat::new("sk-test".into(), base_url.into(), "gpt-4o".into())
    }

    #[test]
    fn debug_redacts_api_key() {
        let chat = test_chat(DEFAULT_OPENAI_URL);
        let debug = format!("{chat:?}");
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let chat = test_chat("https://api.openai.com/v1/");
        assert_eq!(chat.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn capabilities() {
        let chat = test_chat(DEFAULT_OPENAI_URL);
        assert!(chat.supports_streaming());
        assert!(chat.supports_tool_use());
        assert_eq!(chat.name(), "openai");
    }

    #[test]
    fn convert_messages_maps_roles() {
        let messages = vec![
            Message::text(Role::System, "prompt"),
            Message::text(Role::User, "question"),
            Message::text(Role::Assistant, "reply"),
        ];
        let api = convert_messages(&messages);
        assert_eq!(api.len(), 3);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
    }

    #[test]
    fn convert_messages_structured_tool_parts() {
        let messages = vec![
            Message::from_parts(
                Role::Assistant,
                vec![MessagePart::ToolUse {
                    id: "call_1".into(),
                    name: "retrieve_context".into(),
                    input: serde_json::json!({"query": "x"}),
                }],
            ),
            Message::from_parts(
                Role::Tool,
                vec![MessagePart::ToolResult {
                    tool_use_id: "call_1".into(),
                    content: "doc text".into(),
                    is_error: false,
                }],
            ),
        ];
        let api = convert_messages(&messages);
        assert_eq!(api.len(), 2);
        assert!(api[0].tool_calls.is_some());
        assert_eq!(api[1].role, "tool");
        assert_eq!(api[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn parse_tool_call_response() {
        let json = r#"{
            "choices": [{
                "message": {
                    "content": "looking it up",
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "retrieve_context", "arguments": "{\"query\":\"sky\"}"}
                    }]
                }
            }]
        }"#;
        let resp: ChatCompletionsResponse = serde_json::from_str(json).unwrap();
        let calls = resp.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "retrieve_context");
    }

    #[test]
    fn parse_null_content_response() {
        let json = r#"{"choices":[{"message":{"content":null,"tool_calls":[]}}]}"#;
        let resp: ChatCompletionsResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn chat_unreachable_endpoint_errors() {
        let chat = test_chat("http://127.0.0.1:1");
        let messages = vec![Message::text(Role::User, "hi")];
        assert!(chat.chat(&messages).await.is_err());
    }

    #[tokio::test]
    async fn chat_returns_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "pong"}}]
            })))
            .mount(&server)
            .await;

        let chat = test_chat(&server.uri());
        let out = chat.chat(&[Message::text(Role::User, "ping")]).await.unwrap();
        assert_eq!(out, "pong");
    }

    #[tokio::test]
    async fn chat_with_tools_parses_tool_use() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "retrieve_context", "arguments": "{\"query\":\"sky\"}"}
                    }]
                }}]
            })))
            .mount(&server)
            .await;

        let chat = test_chat(&server.uri());
        let tools = vec![ToolDefinition {
            name: "retrieve_context".into(),
            description: "search".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let resp = chat
            .chat_with_tools(&[Message::text(Role::User, "what color is the sky?")], &tools)
            .await
            .unwrap();
        match resp {
            ChatResponse::ToolUse { tool_calls, .. } => {
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].name, "retrieve_context");
                assert_eq!(tool_calls[0].input["query"], "sky");
            }
            ChatResponse::Text(t) => panic!("expected tool use, got text: {t}"),
        }
    }

    #[tokio::test]
    async fn embed_documents_batches_and_preserves_order() {
        let server = MockServer::start().await;
        // Entries deliberately out of order; the adapter must sort by index.
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder =
            OpenAiEmbedder::new("sk-test".into(), server.uri(), "text-embedding-3-small".into());
        let out = embedder
            .embed_documents(&["first".to_owned(), "second".to_owned()])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], vec![1.0, 0.0]);
        assert_eq!(out[1], vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn embed_length_mismatch_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let embedder =
            OpenAiEmbedder::new("sk-test".into(), server.uri(), "text-embedding-3-small".into());
        let result = embedder
            .embed_documents(&["a".to_owned(), "b".to_owned()])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn embed_query_equals_singleton_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [0.5, 0.25]}]
            })))
            .mount(&server)
            .await;

        let embedder =
            OpenAiEmbedder::new("sk-test".into(), server.uri(), "text-embedding-3-small".into());
        let single = embedder.embed_query("hello").await.unwrap();
        let batch = embedder.embed_documents(&["hello".to_owned()]).await.unwrap();
        assert_eq!(single, batch[0]);
    }

    #[tokio::test]
    async fn embed_empty_input_skips_network() {
        let embedder = OpenAiEmbedder::new(
            "sk-test".into(),
            "http://127.0.0.1:1".into(),
            "text-embedding-3-small".into(),
        );
        let out = embedder.embed_documents(&[]).await.unwrap();
        assert!(out.is_empty());
    }
}
