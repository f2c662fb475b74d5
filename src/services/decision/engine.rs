//! Workflow Decision Engine
//!
//! One model call classifies each query into a strategy. The tripped-breaker
//! bypass is the only path that skips the model; classification failures
//! collapse into a safe default and are never fatal.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_llm::{ChatMessage, ModelApi, RequestParams, SystemBlock};

use crate::config::RetryConfig;
use crate::models::{Decision, PendingClarification, Query};
use crate::services::agents::AgentRegistry;
use crate::services::breaker::CircuitBreaker;
use crate::services::executor::retry::resilient_chat;
use crate::utils::{EngineError, EngineResult};

use super::parse::parse_decision;
use super::pending::ClarificationStore;

/// Fixed classification instruction. `{agents}` is substituted before
/// sending.
const DECISION_INSTRUCTION: &str = "\
You route incoming user queries for an orchestration engine.

Classify the query into exactly one case:
1 - direct: you can answer completely right now, no tools, no delegation
2 - single_agent: one specialized tool-using agent should handle it
3 - planned: it needs several distinct steps across different agents

Respond with JSON only, in exactly this shape:
{\"case\": <1|2|3>, \"strategy\": \"<direct|single_agent|planned>\",
 \"rationale\": \"<one sentence>\", \"direct_answer\": \"<case 1 only>\",
 \"needs_clarification\": <true|false>, \"clarifying_questions\": [\"...\"],
 \"agents\": [\"<agent name>\"]}

Rules:
- Set needs_clarification only when the query cannot be acted on at all
  without an answer, and never together with case 1.
- agents lists profile names from the list below, most suitable first.

Available agents:
{agents}";

pub struct WorkflowDecisionEngine {
    model: Arc<dyn ModelApi>,
    breaker: Arc<CircuitBreaker>,
    registry: Arc<AgentRegistry>,
    pending: Arc<ClarificationStore>,
    retry: RetryConfig,
    params: RequestParams,
}

impl WorkflowDecisionEngine {
    pub fn new(
        model: Arc<dyn ModelApi>,
        breaker: Arc<CircuitBreaker>,
        registry: Arc<AgentRegistry>,
        pending: Arc<ClarificationStore>,
        retry: RetryConfig,
        params: RequestParams,
    ) -> Self {
        Self {
            model,
            breaker,
            registry,
            pending,
            retry,
            params,
        }
    }

    /// Classifies one query. Infallible: the worst cases are the overloaded
    /// apology and the single-agent fallback.
    pub async fn decide(&self, query: &Query, cancel: &CancellationToken) -> Decision {
        if self.breaker.is_tripped() {
            info!(query_id = %query.id, "breaker open, bypassing classification");
            return Decision::overloaded();
        }

        let decision = match self.classify(query, cancel).await {
            Ok(decision) => decision.normalized(),
            Err(err) if err.is_overloaded() => {
                warn!(query_id = %query.id, "classification hit overload");
                Decision::overloaded()
            }
            Err(err) => {
                warn!(query_id = %query.id, error = %err, "classification failed, using fallback");
                Decision::fallback()
            }
        };

        if decision.needs_clarification {
            if let Some(conversation_id) = query.conversation_id.as_deref() {
                self.pending.put(
                    conversation_id,
                    PendingClarification {
                        query_id: query.id.clone(),
                        strategy: decision.strategy,
                        agent_selection: decision.agent_selection.clone(),
                    },
                );
            }
        }

        debug!(
            query_id = %query.id,
            strategy = %decision.strategy,
            needs_clarification = decision.needs_clarification,
            "decision made"
        );
        decision
    }

    async fn classify(&self, query: &Query, cancel: &CancellationToken) -> EngineResult<Decision> {
        let instruction =
            DECISION_INSTRUCTION.replace("{agents}", &self.registry.describe_for_routing());
        let system = vec![SystemBlock::new(instruction)];

        let mut messages: Vec<ChatMessage> = query
            .history
            .iter()
            .map(|turn| turn.to_chat_message())
            .collect();
        messages.push(ChatMessage::user(&query.text));

        let response = resilient_chat(
            self.model.as_ref(),
            &self.breaker,
            &self.retry,
            &messages,
            &system,
            &[],
            &self.params,
            cancel,
        )
        .await?;

        parse_decision(&response.text())
            .ok_or_else(|| EngineError::internal("unparseable classification reply"))
    }
}
