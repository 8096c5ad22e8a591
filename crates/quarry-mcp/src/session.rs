use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParams, RawContent};
use rmcp::service::RunningService;
use rmcp::transport::TokioChildProcess;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransport;
use tokio::process::Command;
use url::Url;

use crate::error::McpError;
use crate::tool::RemoteTool;

type ClientService = RunningService<rmcp::RoleClient, ()>;

/// One live MCP connection, either to a spawned child process or a remote
/// streamable-HTTP endpoint.
pub struct McpSession {
    server_id: String,
    service: Arc<ClientService>,
    timeout: Duration,
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("server_id", &self.server_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl McpSession {
    /// Spawn the server process and perform the MCP handshake.
    ///
    /// # Errors
    ///
    /// Returns `McpError::Connection` if spawning or the handshake fails.
    pub async fn connect_command(
        server_id: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        for (k, v) in env {
            cmd.env(k, v);
        }

        let transport = TokioChildProcess::new(cmd).map_err(|e| McpError::Connection {
            server_id: server_id.into(),
            message: e.to_string(),
        })?;

        let service = ().serve(transport).await.map_err(|e| McpError::Connection {
            server_id: server_id.into(),
            message: e.to_string(),
        })?;

        Ok(Self {
            server_id: server_id.into(),
            service: Arc::new(service),
            timeout,
        })
    }

    /// Connect to a remote MCP server over streamable HTTP.
    ///
    /// # Errors
    ///
    /// Returns `McpError::InvalidUrl` for unparseable URLs and
    /// `McpError::Connection` if the handshake fails.
    pub async fn connect_url(
        server_id: &str,
        url: &str,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        Url::parse(url).map_err(|e| McpError::InvalidUrl {
            url: url.into(),
            message: e.to_string(),
        })?;

        let transport = StreamableHttpClientTransport::from_uri(url.to_owned());

        let service = ().serve(transport).await.map_err(|e| McpError::Connection {
            server_id: server_id.into(),
            message: e.to_string(),
        })?;

        Ok(Self {
            server_id: server_id.into(),
            service: Arc::new(service),
            timeout,
        })
    }

    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Request the server's tool list.
    ///
    /// # Errors
    ///
    /// Returns `McpError::ToolCall` if listing fails.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>, McpError> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| McpError::ToolCall {
                server_id: self.server_id.clone(),
                tool_name: "tools/list".into(),
                message: e.to_string(),
            })?;

        Ok(tools
            .into_iter()
            .map(|t| RemoteTool {
                server_id: self.server_id.clone(),
                name: t.name.to_string(),
                description: t.description.map_or_else(String::new, |d| d.to_string()),
                input_schema: serde_json::to_value(&*t.input_schema).unwrap_or_default(),
            })
            .collect())
    }

    /// Invoke a tool and flatten its text content into one string.
    ///
    /// # Errors
    ///
    /// Returns `McpError::Timeout` or `McpError::ToolCall` on failure.
    pub async fn call_tool(&self, name: &str, args: serde_json::Value) -> Result<String, McpError> {
        let arguments: Option<serde_json::Map<String, serde_json::Value>> =
            args.as_object().cloned();

        let params = CallToolRequestParams {
            name: Cow::Owned(name.to_owned()),
            arguments,
            task: None,
            meta: None,
        };

        let result = tokio::time::timeout(self.timeout, self.service.call_tool(params))
            .await
            .map_err(|_| McpError::Timeout {
                server_id: self.server_id.clone(),
                tool_name: name.into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| McpError::ToolCall {
                server_id: self.server_id.clone(),
                tool_name: name.into(),
                message: e.to_string(),
            })?;

        let text = result
            .content
            .iter()
            .filter_map(|c| {
                if let RawContent::Text(t) = &c.raw {
                    Some(t.text.as_str())
                } else {
                    tracing::debug!(
                        server_id = self.server_id,
                        tool = name,
                        "skipping non-text content from MCP tool"
                    );
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }

    /// Graceful shutdown of the underlying connection.
    pub async fn shutdown(self) {
        match Arc::try_unwrap(self.service) {
            Ok(service) => {
                let _ = service.cancel().await;
            }
            Err(_arc) => {
                tracing::warn!(
                    server_id = self.server_id,
                    "cannot shutdown: session has multiple references"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_url_rejects_garbage() {
        let err = McpSession::connect_url("srv", "not-a-url", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn connect_command_missing_binary_errors() {
        let err = McpSession::connect_command(
            "srv",
            "/definitely/not/a/binary",
            &[],
            &HashMap::new(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::Connection { .. }));
    }
}
