use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    Unknown(String),

    #[error("invalid tool parameters: {0}")]
    InvalidParams(String),

    #[error("tool execution failed: {0}")]
    Execution(String),

    #[error("remote tool failed: {0}")]
    Remote(#[from] quarry_mcp::McpError),

    #[error("retrieval failed: {0}")]
    Store(#[from] quarry_store::StoreError),
}

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>>;
type ToolHandler = Box<dyn Fn(serde_json::Value) -> ToolFuture + Send + Sync>;

/// A named, schema-described callable the model may invoke mid-reasoning.
/// The handler is type-erased so store-bound and gateway-bound tools mix in
/// one catalog.
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    handler: ToolHandler,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        handler: impl Fn(serde_json::Value) -> ToolFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Box::new(handler),
        }
    }

    /// Run the tool with JSON arguments, returning its text result.
    ///
    /// # Errors
    ///
    /// Propagates the handler's `ToolError`.
    pub async fn invoke(&self, args: serde_json::Value) -> Result<String, ToolError> {
        (self.handler)(args).await
    }
}

/// Render a schemars-produced schema for the wire: the `$schema` and
/// `title` keys mean nothing to a model.
#[must_use]
pub fn wire_schema(schema: &schemars::Schema) -> serde_json::Value {
    let mut value = serde_json::to_value(schema).unwrap_or_default();
    if let serde_json::Value::Object(ref mut map) = value {
        map.remove("$schema");
        map.remove("title");
    }
    value
}
