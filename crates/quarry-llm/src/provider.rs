use std::pin::Pin;

use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One part of a structured message. Plain conversation turns carry a single
/// `Text` part; the native tool-call wire format needs `ToolUse` and
/// `ToolResult` parts so adapters can reconstruct vendor message shapes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl Message {
    #[must_use]
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_parts(role: Role, parts: Vec<MessagePart>) -> Self {
        let content = parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");
        Self {
            role,
            content,
            parts,
        }
    }

    /// Text to send to providers that only understand flat content.
    #[must_use]
    pub fn flat_content(&self) -> &str {
        &self.content
    }
}

/// Tool made available to the model for a native tool-call request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One tool invocation requested by the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolUseRequest {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Clone, Debug)]
pub enum ChatResponse {
    Text(String),
    ToolUse {
        text: Option<String>,
        tool_calls: Vec<ToolUseRequest>,
    },
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

pub trait ChatProvider: Send + Sync {
    /// Send messages to the model and return the full assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response
    /// is invalid.
    fn chat(
        &self,
        messages: &[Message],
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Stream the assistant response as ordered text fragments. Fragments
    /// concatenate to the same text `chat` would return; dropping the stream
    /// cancels the request without corrupting the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the streaming request cannot be started.
    fn chat_stream(
        &self,
        messages: &[Message],
    ) -> impl Future<Output = Result<ChatStream, LlmError>> + Send;

    /// Send messages along with tool definitions the model may invoke.
    ///
    /// # Errors
    ///
    /// Returns `ToolUseUnsupported` for providers without native tool calls;
    /// callers must check [`ChatProvider::supports_tool_use`] first.
    fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> impl Future<Output = Result<ChatResponse, LlmError>> + Send {
        let _ = (messages, tools);
        async move {
            Err(LlmError::ToolUseUnsupported {
                provider: self.name().to_owned(),
            })
        }
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    fn supports_tool_use(&self) -> bool {
        false
    }

    fn name(&self) -> &str;
}

pub trait Embedder: Send + Sync {
    /// Embed a batch of documents in one provider round trip. The output has
    /// the same length and order as the input; empty input yields an empty
    /// output without calling the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    fn embed_documents(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Embed a single query. Numerically identical to
    /// `embed_documents(&[text])[0]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    fn embed_query(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
    }

    #[test]
    fn text_message_has_no_parts() {
        let msg = Message::text(Role::User, "hello");
        assert_eq!(msg.content, "hello");
        assert!(msg.parts.is_empty());
    }

    #[test]
    fn from_parts_collects_text_content() {
        let msg = Message::from_parts(
            Role::Assistant,
            vec![
                MessagePart::Text {
                    text: "running ".into(),
                },
                MessagePart::ToolUse {
                    id: "call_1".into(),
                    name: "search".into(),
                    input: serde_json::json!({"query": "x"}),
                },
                MessagePart::Text {
                    text: "a search".into(),
                },
            ],
        );
        assert_eq!(msg.content, "running a search");
        assert_eq!(msg.parts.len(), 3);
    }

    #[test]
    fn from_parts_tool_result_only_is_empty_content() {
        let msg = Message::from_parts(
            Role::Tool,
            vec![MessagePart::ToolResult {
                tool_use_id: "call_1".into(),
                content: "42".into(),
                is_error: false,
            }],
        );
        assert!(msg.content.is_empty());
    }

    #[test]
    fn message_json_roundtrip() {
        let msg = Message::text(Role::Assistant, "answer");
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.role, Role::Assistant);
        assert_eq!(parsed.content, "answer");
    }

    #[test]
    fn message_deserializes_without_parts_field() {
        let parsed: Message =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert!(parsed.parts.is_empty());
    }
}
