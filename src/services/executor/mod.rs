//! Resilient LLM Executor
//!
//! The agentic loop: assemble messages, mark cache segments, call the model
//! under the resilience envelope, dispatch requested tools, feed results
//! back, repeat up to the iteration cap. One gate permit is held for the
//! whole run, internal retries included.

pub(crate) mod retry;

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use switchboard_llm::{
    ChatMessage, ChatResponse, ModelApi, RequestParams, Role, StopReason, SystemBlock,
    TokenUsage, ToolInvocation, ToolSpec,
};
use switchboard_tools::{ToolOutcome, ToolRouter};

use crate::config::ExecutorConfig;
use crate::models::{ExecutionRequest, RunSummary};
use crate::services::agents::AgentProfile;
use crate::services::breaker::CircuitBreaker;
use crate::services::cache_plan::PromptCachePlanner;
use crate::services::gate::ConcurrencyGate;
use crate::services::interaction::InteractionBroker;
use crate::services::telemetry::{namespaces, RawEvent};
use crate::utils::{EngineError, EngineResult};

use retry::resilient_chat;

/// Reserved tool the model uses to ask the user a question mid-run.
pub const ASK_USER_TOOL: &str = "ask_user";

/// Substituted when every assembled message turns out empty.
const FALLBACK_GREETING: &str = "Hello";

/// Synthetic user turn injected on the final permitted iteration when the
/// previous response still wanted tools.
const WRAP_UP_INSTRUCTION: &str = "\
You have reached the tool-call limit for this run. Do not call any more \
tools. Produce your best final answer from what you have gathered so far, \
and say explicitly if it is incomplete.";

pub struct ResilientLlmExecutor {
    model: Arc<dyn ModelApi>,
    tools: Arc<ToolRouter>,
    breaker: Arc<CircuitBreaker>,
    gate: ConcurrencyGate,
    cache: PromptCachePlanner,
    interaction: Arc<InteractionBroker>,
    config: ExecutorConfig,
    params: RequestParams,
}

impl ResilientLlmExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: Arc<dyn ModelApi>,
        tools: Arc<ToolRouter>,
        breaker: Arc<CircuitBreaker>,
        gate: ConcurrencyGate,
        cache: PromptCachePlanner,
        interaction: Arc<InteractionBroker>,
        config: ExecutorConfig,
        params: RequestParams,
    ) -> Self {
        Self {
            model,
            tools,
            breaker,
            gate,
            cache,
            interaction,
            config,
            params,
        }
    }

    /// One agentic run for one agent profile. Holds a gate permit from entry
    /// to return; the permit drops on every exit path.
    pub async fn run(
        &self,
        request: &ExecutionRequest,
        profile: &AgentProfile,
        events: &mpsc::Sender<RawEvent>,
        cancel: &CancellationToken,
    ) -> EngineResult<RunSummary> {
        let _permit = self.gate.acquire().await?;
        info!(
            agent = %profile.name,
            strategy = %request.strategy,
            "executor run starting"
        );

        let mut system = vec![SystemBlock::new(profile.instructions.clone())];
        let mut catalog = profile.filter_catalog(self.tools.catalog().await);
        if !catalog.iter().any(|tool| tool.name == ASK_USER_TOOL) {
            catalog.push(ask_user_tool());
        }
        let mut messages = assemble_messages(request);

        let mut params = self.params.clone();
        params.long_running = request.long_running;

        let mut responses: Vec<String> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut iterations = 0u32;
        let mut previous_wanted_tools = false;

        for iteration in 1..=self.config.max_iterations {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            self.cache.plan(
                &mut system,
                &mut catalog,
                &mut messages,
                &params.model,
                params.long_running,
            );

            if iteration == self.config.max_iterations && previous_wanted_tools {
                messages.push(ChatMessage::user(WRAP_UP_INSTRUCTION));
            }

            let response = resilient_chat(
                self.model.as_ref(),
                &self.breaker,
                &self.config.retry,
                &messages,
                &system,
                &catalog,
                &params,
                cancel,
            )
            .await?;

            iterations = iteration;
            usage.add(&response.usage);
            self.emit_response(profile, &response, events).await;

            let text = response.text();
            if !text.trim().is_empty() {
                responses.push(text);
            }

            if response.stop_reason != StopReason::ToolUse {
                break;
            }

            let invocations = response.tool_invocations();
            messages.push(ChatMessage::from_blocks(Role::Assistant, response.content));
            for invocation in invocations {
                let outcome = self.invoke_tool(&invocation, events, cancel).await?;
                self.emit_tool_result(profile, &invocation, &outcome, events)
                    .await;
                messages.push(ChatMessage::tool_result(
                    &invocation.id,
                    outcome.to_content(),
                    !outcome.success,
                ));
            }
            previous_wanted_tools = true;
        }

        info!(agent = %profile.name, iterations, "executor run finished");
        Ok(RunSummary::new(responses.join("\n\n"), usage, iterations))
    }

    /// One tool call. Protocol failures become error outcomes the model can
    /// recover from; only cancellation is fatal here.
    async fn invoke_tool(
        &self,
        invocation: &ToolInvocation,
        events: &mpsc::Sender<RawEvent>,
        cancel: &CancellationToken,
    ) -> EngineResult<ToolOutcome> {
        if invocation.name == ASK_USER_TOOL {
            return self.ask_user(invocation, events, cancel).await;
        }

        if self.config.guarded_tools.iter().any(|t| t == &invocation.name) {
            let allowed = self.request_permission(invocation, events, cancel).await?;
            if !allowed {
                warn!(tool = %invocation.name, "permission denied");
                return Ok(ToolOutcome::err(format!(
                    "The user declined to allow the {} tool.",
                    invocation.name
                )));
            }
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = self.tools.dispatch(&invocation.name, &invocation.arguments) => result,
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(tool = %invocation.name, error = %err, "tool call failed, feeding error back");
                Ok(ToolOutcome::err(err.to_string()))
            }
        }
    }

    /// Suspends the run on a oneshot until someone answers the model's
    /// question through the interaction broker.
    async fn ask_user(
        &self,
        invocation: &ToolInvocation,
        events: &mpsc::Sender<RawEvent>,
        cancel: &CancellationToken,
    ) -> EngineResult<ToolOutcome> {
        let question = invocation
            .arguments
            .get("question")
            .and_then(|q| q.as_str())
            .unwrap_or("The agent needs more information to continue.")
            .to_string();

        let (request_id, receiver) = self.interaction.open_input();
        info!(request_id = %request_id, "suspending for human input");

        let event = RawEvent::new(namespaces::WORKFLOW_LIFECYCLE)
            .with_action("Clarification")
            .with_payload(json!({
                "content": question,
                "data": { "request_id": request_id, "kind": "human_input" },
            }));
        let _ = events.send(event).await;

        let answer = tokio::select! {
            _ = cancel.cancelled() => {
                self.interaction.discard_input(&request_id);
                return Err(EngineError::Cancelled);
            }
            answer = receiver => answer,
        };

        match answer {
            Ok(answer) => Ok(ToolOutcome::ok(answer)),
            // A dropped sender means the wait was abandoned.
            Err(_) => Err(EngineError::Cancelled),
        }
    }

    async fn request_permission(
        &self,
        invocation: &ToolInvocation,
        events: &mpsc::Sender<RawEvent>,
        cancel: &CancellationToken,
    ) -> EngineResult<bool> {
        let (operation_id, receiver) = self.interaction.open_permission();
        info!(
            operation_id = %operation_id,
            tool = %invocation.name,
            "suspending for tool permission"
        );

        let event = RawEvent::new(namespaces::WORKFLOW_LIFECYCLE)
            .with_action("Clarification")
            .with_payload(json!({
                "content": format!("Permission needed to run tool: {}", invocation.name),
                "data": {
                    "operation_id": operation_id,
                    "tool": invocation.name.clone(),
                    "kind": "tool_permission",
                },
            }));
        let _ = events.send(event).await;

        tokio::select! {
            _ = cancel.cancelled() => {
                self.interaction.discard_permission(&operation_id);
                Err(EngineError::Cancelled)
            }
            allowed = receiver => Ok(allowed.unwrap_or(false)),
        }
    }

    async fn emit_response(
        &self,
        profile: &AgentProfile,
        response: &ChatResponse,
        events: &mpsc::Sender<RawEvent>,
    ) {
        let content = serde_json::to_value(&response.content).unwrap_or(Value::Null);
        let event = RawEvent::new(namespaces::agent_model(&profile.name))
            .with_payload(json!({ "content": content }))
            .with_context("agent_name", json!(profile.name.clone()));
        let _ = events.send(event).await;
    }

    async fn emit_tool_result(
        &self,
        profile: &AgentProfile,
        invocation: &ToolInvocation,
        outcome: &ToolOutcome,
        events: &mpsc::Sender<RawEvent>,
    ) {
        let event = RawEvent::new(namespaces::agent_model(&profile.name))
            .with_payload(json!({
                "content": outcome.to_content(),
                "is_error": !outcome.success,
                "tool": invocation.name.clone(),
            }))
            .with_context("agent_name", json!(profile.name.clone()));
        let _ = events.send(event).await;
    }
}

/// History plus the current message, with empty content filtered out. A
/// fully-empty assembly becomes a single greeting rather than an error.
fn assemble_messages(request: &ExecutionRequest) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = request
        .history
        .iter()
        .map(|turn| turn.to_chat_message())
        .collect();
    messages.push(ChatMessage::user(&request.message));
    messages.retain(|m| !m.is_empty());
    if messages.is_empty() {
        warn!("message content is entirely empty, substituting a greeting");
        messages.push(ChatMessage::user(FALLBACK_GREETING));
    }
    messages
}

fn ask_user_tool() -> ToolSpec {
    ToolSpec::new(
        ASK_USER_TOOL,
        "Ask the user one question and wait for their answer. Use only when \
         you cannot proceed without it.",
        json!({
            "type": "object",
            "properties": {
                "question": { "type": "string", "description": "The question to ask" }
            },
            "required": ["question"]
        }),
    )
}
