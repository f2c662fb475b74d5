//! Plan Generation
//!
//! The planned strategy's first move: one model call producing a JSON plan of
//! delegated steps, parsed tolerantly. Unusable plan text is not an error;
//! the caller degrades to a single-agent run.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use switchboard_llm::{ChatMessage, ModelApi, RequestParams, SystemBlock, TokenUsage};

use crate::config::RetryConfig;
use crate::models::ExecutionRequest;
use crate::services::agents::AgentRegistry;
use crate::services::breaker::CircuitBreaker;
use crate::services::executor::retry::resilient_chat;
use crate::utils::EngineResult;

/// Upper bound on plan length. The model is told the limit; longer plans are
/// truncated rather than rejected.
const MAX_PLAN_STEPS: usize = 8;

/// Fixed instruction for the planning call. `{max_steps}` and `{agents}` are
/// substituted before sending.
const PLAN_INSTRUCTION: &str = "\
You break a user request into a short sequence of delegated steps.

Respond with JSON only, no prose, in exactly this shape:
{\"steps\": [{\"agent\": \"<agent name>\", \"task\": \"<what that agent should do>\"}]}

Rules:
- Use at most {max_steps} steps and prefer the fewest that cover the request.
- Only use agent names from the list below.
- Write each task so it stands alone; later steps receive earlier results.

Available agents:
{agents}";

/// One delegated unit of work within a plan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanStep {
    #[serde(default)]
    pub agent: String,
    pub task: String,
}

/// An ordered sequence of steps, executed front to back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

/// What one planning call produced. `plan` is `None` when the text was not a
/// usable plan; `raw` is kept for telemetry either way.
#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: Option<Plan>,
    pub raw: String,
    pub usage: TokenUsage,
}

/// Pulls a JSON value out of model text, tolerating code fences and prose
/// around the object.
pub(crate) fn extract_json_value(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// Parses plan text into steps, dropping blank tasks. `None` means degrade.
pub fn parse_plan(text: &str) -> Option<Plan> {
    let value = extract_json_value(text)?;
    let mut plan: Plan = serde_json::from_value(value).ok()?;
    plan.steps.retain(|step| !step.task.trim().is_empty());
    if plan.steps.is_empty() {
        return None;
    }
    if plan.steps.len() > MAX_PLAN_STEPS {
        warn!(steps = plan.steps.len(), "plan too long, truncating");
        plan.steps.truncate(MAX_PLAN_STEPS);
    }
    Some(plan)
}

pub struct Planner {
    model: Arc<dyn ModelApi>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    params: RequestParams,
}

impl Planner {
    pub fn new(
        model: Arc<dyn ModelApi>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryConfig,
        params: RequestParams,
    ) -> Self {
        Self {
            model,
            breaker,
            retry,
            params,
        }
    }

    /// One planning call over the request's history plus current message.
    pub async fn generate(
        &self,
        request: &ExecutionRequest,
        registry: &AgentRegistry,
        cancel: &CancellationToken,
    ) -> EngineResult<PlanOutcome> {
        let system = vec![SystemBlock::new(plan_instruction(registry))];
        let mut messages: Vec<ChatMessage> = request
            .history
            .iter()
            .map(|turn| turn.to_chat_message())
            .collect();
        messages.push(ChatMessage::user(&request.message));

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

        let raw = response.text();
        let plan = parse_plan(&raw);
        match &plan {
            Some(plan) => debug!(steps = plan.steps.len(), "plan generated"),
            None => warn!("plan text unusable, degrading to single-agent run"),
        }

        Ok(PlanOutcome {
            plan,
            raw,
            usage: response.usage,
        })
    }
}

fn plan_instruction(registry: &AgentRegistry) -> String {
    PLAN_INSTRUCTION
        .replace("{max_steps}", &MAX_PLAN_STEPS.to_string())
        .replace("{agents}", &registry.describe_for_routing())
}
