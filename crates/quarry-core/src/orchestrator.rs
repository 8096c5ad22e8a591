use std::sync::Arc;

use futures::StreamExt;

use quarry_llm::provider::{
    ChatProvider, ChatResponse, ChatStream, Message, MessagePart, Role, ToolUseRequest,
};
use quarry_mcp::{ServerDecl, ToolGateway};
use quarry_tools::{ToolCatalog, ToolError, ToolSpec};

use crate::error::AgentError;

/// Reasoning-loop state. One `generate` call moves
/// `Idle → AwaitingModel → (ToolCallRequested → ToolExecuting →
/// AwaitingModel)* → Done`, or `Failed` on error or budget exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Idle,
    AwaitingModel,
    ToolCallRequested,
    ToolExecuting,
    Done,
    Failed,
}

/// Drives the bounded reasoning loop: model turns, tool dispatch, and the
/// per-request remote-tool session lifecycle.
///
/// Holds no mutable state across calls; concurrent `generate` calls are
/// fully isolated.
pub struct AgentOrchestrator<P: ChatProvider> {
    provider: P,
    local_tools: Vec<Arc<ToolSpec>>,
    mcp_servers: Vec<ServerDecl>,
    system_prompt: String,
    max_steps: usize,
    max_parallel_tools: usize,
}

impl<P: ChatProvider> AgentOrchestrator<P> {
    #[must_use]
    pub fn new(
        provider: P,
        local_tools: Vec<Arc<ToolSpec>>,
        mcp_servers: Vec<ServerDecl>,
        system_prompt: String,
        max_steps: usize,
        max_parallel_tools: usize,
    ) -> Self {
        Self {
            provider,
            local_tools,
            mcp_servers,
            system_prompt,
            max_steps: max_steps.max(1),
            max_parallel_tools: max_parallel_tools.max(1),
        }
    }

    /// Answer `question`, letting the model call tools along the way.
    ///
    /// Remote sessions open right before the loop and close unconditionally
    /// after it, however the loop ends.
    ///
    /// # Errors
    ///
    /// Returns `BudgetExceeded` when the step budget runs out, or the
    /// underlying provider/tool error on an unrecoverable failure. Never
    /// returns an empty answer in place of an error.
    pub async fn generate(&self, question: &str) -> Result<String, AgentError> {
        let gateway = Arc::new(ToolGateway::new(self.mcp_servers.clone()));
        let mut catalog = ToolCatalog::new(self.local_tools.clone());

        if !gateway.is_empty() {
            let remote = gateway.connect_all().await;
            tracing::debug!(remote = remote.len(), "remote tools discovered");
            catalog.add_remote(remote, Arc::clone(&gateway));
        }

        let result = if self.provider.supports_tool_use() {
            self.run_native(question, &catalog).await
        } else {
            self.run_prompted(question, &catalog).await
        };

        gateway.shutdown_all().await;
        result
    }

    /// Stream a single-turn answer (no tool loop). Providers without
    /// streaming fall back to one fragment carrying the full response.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the request cannot be started.
    pub async fn generate_stream(&self, question: &str) -> Result<ChatStream, AgentError> {
        let messages = vec![
            Message::text(Role::System, self.system_prompt.clone()),
            Message::text(Role::User, question),
        ];
        if self.provider.supports_streaming() {
            Ok(self.provider.chat_stream(&messages).await?)
        } else {
            let text = self.provider.chat(&messages).await?;
            Ok(Box::pin(tokio_stream::once(Ok(text))))
        }
    }

    /// Native tool-call loop for providers that accept tool definitions on
    /// the wire.
    async fn run_native(
        &self,
        question: &str,
        catalog: &ToolCatalog,
    ) -> Result<String, AgentError> {
        let definitions = catalog.definitions();
        let mut messages = vec![
            Message::text(Role::System, self.system_prompt.clone()),
            Message::text(Role::User, question),
        ];

        let mut state = LoopState::Idle;
        tracing::trace!(?state, "reasoning loop starting");
        let mut last_step_error: Option<String> = None;

        for step in 0..self.max_steps {
            state = LoopState::AwaitingModel;
            tracing::debug!(step, ?state, "model turn");
            last_step_error = None;

            let response = match self.provider.chat_with_tools(&messages, &definitions).await {
                Ok(r) => r,
                Err(e) => {
                    state = LoopState::Failed;
                    tracing::debug!(step, ?state, "provider call failed");
                    return Err(e.into());
                }
            };

            let (text, tool_calls) = match response {
                ChatResponse::Text(text) => {
                    state = LoopState::Done;
                    tracing::debug!(step, ?state, "final answer produced");
                    return Ok(text);
                }
                ChatResponse::ToolUse { text, tool_calls } => (text, tool_calls),
            };

            state = LoopState::ToolCallRequested;
            tracing::debug!(step, ?state, calls = tool_calls.len(), "tool calls requested");

            let mut parts: Vec<MessagePart> = Vec::new();
            if let Some(t) = text
                && !t.is_empty()
            {
                parts.push(MessagePart::Text { text: t });
            }
            for tc in &tool_calls {
                parts.push(MessagePart::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    input: tc.input.clone(),
                });
            }
            messages.push(Message::from_parts(Role::Assistant, parts));

            state = LoopState::ToolExecuting;
            tracing::debug!(step, ?state, "executing tools");
            let results = dispatch_tool_calls(catalog, &tool_calls, self.max_parallel_tools).await;

            // Tool-result order matches the order the model requested,
            // not completion order.
            let result_parts: Vec<MessagePart> = tool_calls
                .iter()
                .zip(results)
                .map(|(tc, result)| {
                    let (content, is_error) = match result {
                        Ok(output) => (output, false),
                        Err(e) => {
                            let rendered = format!("[error] {e}");
                            tracing::warn!(tool = tc.name, "tool call failed: {e}");
                            last_step_error.get_or_insert_with(|| e.to_string());
                            (rendered, true)
                        }
                    };
                    MessagePart::ToolResult {
                        tool_use_id: tc.id.clone(),
                        content,
                        is_error,
                    }
                })
                .collect();
            messages.push(Message::from_parts(Role::Tool, result_parts));
        }

        state = LoopState::Failed;
        tracing::debug!(?state, steps = self.max_steps, "step budget exhausted");
        // A tool failure on the final permitted step is part of the
        // returned error rather than another tool-result turn.
        match last_step_error {
            Some(message) => Err(AgentError::Tool(ToolError::Execution(message))),
            None => Err(AgentError::BudgetExceeded {
                steps: self.max_steps,
            }),
        }
    }

    /// Prompt-encoded tool loop for providers without native tool calls:
    /// the catalog is advertised in the system prompt and invocations come
    /// back as fenced ```tool blocks.
    async fn run_prompted(
        &self,
        question: &str,
        catalog: &ToolCatalog,
    ) -> Result<String, AgentError> {
        let system = format!("{}\n\n{}", self.system_prompt, catalog.format_for_prompt());
        let mut messages = vec![
            Message::text(Role::System, system),
            Message::text(Role::User, question),
        ];

        let mut last_step_error: Option<String> = None;

        for step in 0..self.max_steps {
            last_step_error = None;
            tracing::debug!(step, "model turn (prompted tools)");
            let response = self.provider.chat(&messages).await?;

            let invocations = ToolCatalog::extract_tool_blocks(&response);
            if invocations.is_empty() {
                return Ok(response);
            }

            messages.push(Message::text(Role::Assistant, response));

            let calls: Vec<ToolUseRequest> = invocations
                .into_iter()
                .enumerate()
                .map(|(i, inv)| ToolUseRequest {
                    id: format!("block_{i}"),
                    name: inv.name,
                    input: inv.arguments,
                })
                .collect();
            let results = dispatch_tool_calls(catalog, &calls, self.max_parallel_tools).await;

            let mut feedback = String::new();
            for (call, result) in calls.iter().zip(results) {
                let body = match result {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!(tool = call.name, "tool call failed: {e}");
                        last_step_error.get_or_insert_with(|| e.to_string());
                        format!("[error] {e}")
                    }
                };
                feedback.push_str(&format!("[tool output: {}]\n```\n{body}\n```\n", call.name));
            }
            messages.push(Message::text(Role::User, feedback));
        }

        match last_step_error {
            Some(message) => Err(AgentError::Tool(ToolError::Execution(message))),
            None => Err(AgentError::BudgetExceeded {
                steps: self.max_steps,
            }),
        }
    }
}

/// Run the requested tool calls concurrently (bounded) and return results in
/// request order.
async fn dispatch_tool_calls(
    catalog: &ToolCatalog,
    calls: &[ToolUseRequest],
    max_parallel: usize,
) -> Vec<Result<String, ToolError>> {
    futures::stream::iter(
        calls
            .iter()
            .map(|tc| catalog.invoke(&tc.name, tc.input.clone())),
    )
    .buffered(max_parallel)
    .collect()
    .await
}
