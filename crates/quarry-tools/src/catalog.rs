use std::fmt::Write;
use std::sync::Arc;

use serde::Deserialize;

use quarry_llm::provider::ToolDefinition;
use quarry_mcp::{RemoteTool, ToolGateway};

use crate::spec::{ToolError, ToolSpec};

/// A tool invocation parsed from a fenced ```tool block, for providers
/// without native tool calls.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default = "empty_object")]
    pub arguments: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// The tools available to one generation call: the store-bound retrieval
/// tools plus whatever the remote gateway discovered for this request.
pub struct ToolCatalog {
    tools: Vec<Arc<ToolSpec>>,
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tool_count", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl ToolCatalog {
    #[must_use]
    pub fn new(local_tools: Vec<Arc<ToolSpec>>) -> Self {
        Self { tools: local_tools }
    }

    /// Merge remote tools, each wrapped to proxy through the gateway. Name
    /// collisions with already-registered tools fall back to the qualified
    /// `server:tool` name; an exact duplicate of that is dropped.
    pub fn add_remote(&mut self, remote: Vec<RemoteTool>, gateway: Arc<ToolGateway>) {
        for tool in remote {
            let name = if self.find(&tool.name).is_none() {
                tool.name.clone()
            } else {
                tool.qualified_name()
            };
            if self.find(&name).is_some() {
                tracing::warn!(name, "duplicate remote tool dropped");
                continue;
            }

            let gateway = Arc::clone(&gateway);
            let server_id = tool.server_id.clone();
            let remote_name = tool.name.clone();
            self.tools.push(Arc::new(ToolSpec::new(
                name,
                tool.description.clone(),
                tool.input_schema.clone(),
                move |args| {
                    let gateway = Arc::clone(&gateway);
                    let server_id = server_id.clone();
                    let remote_name = remote_name.clone();
                    Box::pin(async move {
                        gateway
                            .call_tool(&server_id, &remote_name, args)
                            .await
                            .map_err(ToolError::from)
                    })
                },
            )));
        }
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().map(AsRef::as_ref).find(|t| t.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch an invocation by name.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::Unknown` for unregistered names, otherwise the
    /// tool's own error.
    pub async fn invoke(&self, name: &str, args: serde_json::Value) -> Result<String, ToolError> {
        let tool = self
            .find(name)
            .ok_or_else(|| ToolError::Unknown(name.to_owned()))?;
        tool.invoke(args).await
    }

    /// Definitions for providers with native tool calls.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            })
            .collect()
    }

    /// Render the catalog as a prompt section for providers without native
    /// tool calls. The model answers with fenced ```tool JSON blocks.
    #[must_use]
    pub fn format_for_prompt(&self) -> String {
        let mut out = String::from("<tools>\n");
        for tool in &self.tools {
            let _ = writeln!(out, "## {}", tool.name);
            let _ = writeln!(out, "{}", tool.description);
            let _ = writeln!(
                out,
                "Invocation: a ```tool fenced block containing \
                 {{\"name\": \"{}\", \"arguments\": {{...}}}}",
                tool.name
            );
            format_schema_params(&mut out, &tool.input_schema);
            out.push('\n');
        }
        out.push_str("</tools>");
        out
    }

    /// Extract every fenced ```tool block from a model response.
    #[must_use]
    pub fn extract_tool_blocks(response: &str) -> Vec<ToolInvocation> {
        extract_fenced_blocks(response, "tool")
            .into_iter()
            .filter_map(|block| match serde_json::from_str(&block) {
                Ok(invocation) => Some(invocation),
                Err(e) => {
                    tracing::warn!("unparseable tool block ignored: {e}");
                    None
                }
            })
            .collect()
    }
}

fn format_schema_params(out: &mut String, schema: &serde_json::Value) {
    let Some(obj) = schema.as_object() else {
        return;
    };
    let Some(serde_json::Value::Object(props)) = obj.get("properties") else {
        return;
    };
    if props.is_empty() {
        return;
    }

    let required: Vec<&str> = obj
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let _ = writeln!(out, "Parameters:");
    for (name, prop) in props {
        let prop_obj = prop.as_object();
        let ty = prop_obj
            .and_then(|o| {
                o.get("type")
                    .and_then(|v| v.as_str())
                    .or_else(|| extract_non_null_type(o))
            })
            .unwrap_or("string");
        let desc = prop_obj
            .and_then(|o| o.get("description"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let req = if required.contains(&name.as_str()) {
            "required"
        } else {
            "optional"
        };
        let _ = writeln!(out, "  - {name}: {desc} ({ty}, {req})");
    }
}

/// Extract the primary type when schemars renders `Option<T>` as
/// `"type": ["T", "null"]` or `"anyOf": [{"type": "T"}, {"type": "null"}]`.
fn extract_non_null_type(obj: &serde_json::Map<String, serde_json::Value>) -> Option<&str> {
    if let Some(arr) = obj.get("type").and_then(|v| v.as_array()) {
        return arr.iter().filter_map(|v| v.as_str()).find(|t| *t != "null");
    }
    obj.get("anyOf")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_object())
        .filter_map(|o| o.get("type")?.as_str())
        .find(|t| *t != "null")
}

fn extract_fenced_blocks(text: &str, tag: &str) -> Vec<String> {
    let open = format!("```{tag}\n");
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        let body_start = &rest[start + open.len()..];
        let Some(end) = body_start.find("```") else {
            break;
        };
        blocks.push(body_start[..end].trim().to_owned());
        rest = &body_start[end + 3..];
    }

    blocks
}
