//! Execution Models
//!
//! The normalized executor input, per-run accounting, and the typed outcome
//! handed back to whoever submitted the query.

use serde::{Deserialize, Serialize};

use switchboard_core::WorkflowType;
use switchboard_llm::TokenUsage;

use super::decision::{Decision, Strategy};
use super::query::{ConversationTurn, Query};

/// Normalized input to the executor, decoupled from the incoming query shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub strategy: Strategy,
    /// Agent profile names, routing order
    #[serde(default)]
    pub agent_selection: Vec<String>,
    pub message: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub attachment_ids: Vec<String>,
    /// Flags the run for the extended prompt-cache tier
    #[serde(default)]
    pub long_running: bool,
}

impl ExecutionRequest {
    pub fn new(strategy: Strategy, message: impl Into<String>) -> Self {
        Self {
            strategy,
            agent_selection: Vec::new(),
            message: message.into(),
            history: Vec::new(),
            attachment_ids: Vec::new(),
            long_running: false,
        }
    }

    /// Build the executor input for a classified query
    pub fn from_query(query: &Query, decision: &Decision) -> Self {
        Self {
            strategy: decision.strategy,
            agent_selection: decision.agent_selection.clone(),
            message: query.text.clone(),
            history: query.history.clone(),
            attachment_ids: query.attachment_ids.clone(),
            long_running: false,
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_agents(mut self, agents: Vec<String>) -> Self {
        self.agent_selection = agents;
        self
    }

    pub fn with_long_running(mut self, long_running: bool) -> Self {
        self.long_running = long_running;
        self
    }
}

/// What one executor run produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Concatenated model responses across iterations
    pub text: String,
    #[serde(default)]
    pub usage: TokenUsage,
    /// Model round-trips consumed
    pub iterations: u32,
}

impl RunSummary {
    pub fn new(text: impl Into<String>, usage: TokenUsage, iterations: u32) -> Self {
        Self {
            text: text.into(),
            usage,
            iterations,
        }
    }

    /// Fold another run into this one, summing usage and iterations
    pub fn absorb(&mut self, other: RunSummary) {
        if !self.text.is_empty() && !other.text.is_empty() {
            self.text.push_str("\n\n");
        }
        self.text.push_str(&other.text);
        self.usage.add(&other.usage);
        self.iterations += other.iterations;
    }
}

/// The typed result of submitting a query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// The pipeline ran to completion and produced an answer
    Completed {
        text: String,
        workflow_type: WorkflowType,
        #[serde(default)]
        usage: TokenUsage,
    },
    /// Suspended pending the user's answer to clarifying questions
    NeedsClarification { questions: Vec<String> },
    /// Refused or aborted because the upstream is overloaded
    Overloaded { message: String },
    /// Aborted with a structured error
    Failed { error: String },
}

impl QueryOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, QueryOutcome::Completed { .. })
    }

    /// The answer text, when there is one
    pub fn text(&self) -> Option<&str> {
        match self {
            QueryOutcome::Completed { text, .. } => Some(text),
            QueryOutcome::Overloaded { message } => Some(message),
            _ => None,
        }
    }
}
