use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::error::McpError;
use crate::session::McpSession;
use crate::tool::RemoteTool;

fn default_timeout_secs() -> u64 {
    30
}

/// Declaration of one remote tool server: either a streamable-HTTP `url` or
/// a `command` to spawn, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerDecl {
    /// Stable identifier; defaults to `server_<index>` when omitted.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Short-lived gateway to the declared remote tool servers. Built for one
/// generation call: `connect_all` before the reasoning loop, `shutdown_all`
/// unconditionally after it.
pub struct ToolGateway {
    decls: Vec<ServerDecl>,
    sessions: RwLock<HashMap<String, McpSession>>,
}

impl std::fmt::Debug for ToolGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolGateway")
            .field("server_count", &self.decls.len())
            .finish_non_exhaustive()
    }
}

async fn connect_decl(server_id: String, decl: ServerDecl) -> Result<McpSession, McpError> {
    let timeout = Duration::from_secs(decl.timeout_secs);
    match (&decl.url, &decl.command) {
        (Some(url), None) => McpSession::connect_url(&server_id, url, timeout).await,
        (None, Some(command)) => {
            McpSession::connect_command(&server_id, command, &decl.args, &decl.env, timeout).await
        }
        _ => Err(McpError::InvalidDecl {
            server_id,
            message: "declare exactly one of 'url' or 'command'".into(),
        }),
    }
}

impl ToolGateway {
    #[must_use]
    pub fn new(decls: Vec<ServerDecl>) -> Self {
        Self {
            decls,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// True when no servers are declared; callers skip the gateway entirely.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Open one session per declaration concurrently and return the merged
    /// tool list. Servers that fail to connect or list are logged and
    /// skipped; with zero declarations this returns an empty list without
    /// opening anything.
    pub async fn connect_all(&self) -> Vec<RemoteTool> {
        let mut join_set = JoinSet::new();

        for (idx, decl) in self.decls.iter().cloned().enumerate() {
            let server_id = decl.id.clone().unwrap_or_else(|| format!("server_{idx}"));
            join_set.spawn(async move {
                let result = connect_decl(server_id.clone(), decl).await;
                (server_id, result)
            });
        }

        let mut all_tools = Vec::new();
        let mut sessions = self.sessions.write().await;

        while let Some(joined) = join_set.join_next().await {
            let Ok((server_id, connect_result)) = joined else {
                tracing::warn!("MCP connection task panicked");
                continue;
            };

            match connect_result {
                Ok(session) => match session.list_tools().await {
                    Ok(tools) => {
                        tracing::info!(server_id, tools = tools.len(), "connected to MCP server");
                        all_tools.extend(tools);
                        sessions.insert(server_id, session);
                    }
                    Err(e) => {
                        tracing::warn!(server_id, "failed to list tools: {e}");
                        session.shutdown().await;
                    }
                },
                Err(e) => {
                    tracing::warn!(server_id, "MCP server connection failed: {e}");
                }
            }
        }

        all_tools
    }

    /// Route a tool invocation to the owning session.
    ///
    /// # Errors
    ///
    /// Returns `McpError::ServerNotFound` if that server is not connected,
    /// or the session's own error on failure.
    pub async fn call_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<String, McpError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(server_id)
            .ok_or_else(|| McpError::ServerNotFound {
                server_id: server_id.into(),
            })?;
        session.call_tool(tool_name, args).await
    }

    /// Close every open session. Safe to call when nothing is connected.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        for (id, session) in sessions.drain() {
            tracing::debug!(server_id = id, "shutting down MCP session");
            session.shutdown().await;
        }
    }
}
