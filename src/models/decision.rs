//! Decision Models
//!
//! The classification produced for each query and the suspended-clarification
//! record that lets a conversation resume where it left off.

use serde::{Deserialize, Serialize};
use tracing::warn;

use switchboard_core::WorkflowType;

/// How a query will be satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Answer in one shot, no tools
    Direct,
    /// Route to one specialized tool-using agent
    SingleAgent,
    /// Multi-step plan across several agents
    Planned,
}

impl Strategy {
    /// The workflow label carried on canonical updates for this strategy
    pub fn workflow_type(&self) -> WorkflowType {
        match self {
            Strategy::Direct => WorkflowType::Simple,
            Strategy::SingleAgent => WorkflowType::SingleAgent,
            Strategy::Planned => WorkflowType::Planned,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::SingleAgent => "single_agent",
            Strategy::Planned => "planned",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Strategy::Direct),
            "single_agent" => Ok(Strategy::SingleAgent),
            "planned" => Ok(Strategy::Planned),
            _ => Err(format!("Unknown strategy: {}", s)),
        }
    }
}

/// The outcome of classifying one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub strategy: Strategy,
    pub rationale: String,
    #[serde(default)]
    pub needs_clarification: bool,
    #[serde(default)]
    pub clarifying_questions: Vec<String>,
    /// Only meaningful for the direct strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_answer: Option<String>,
    /// Set when the breaker bypass produced this decision
    #[serde(default)]
    pub overloaded: bool,
    /// Agent profile names chosen by the classifier, routing order
    #[serde(default)]
    pub agent_selection: Vec<String>,
}

impl Decision {
    pub fn direct(answer: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::Direct,
            rationale: rationale.into(),
            needs_clarification: false,
            clarifying_questions: Vec::new(),
            direct_answer: Some(answer.into()),
            overloaded: false,
            agent_selection: Vec::new(),
        }
    }

    /// The breaker-tripped bypass: apologize without touching the model.
    pub fn overloaded() -> Self {
        Self {
            strategy: Strategy::Direct,
            rationale: "upstream overloaded, circuit breaker engaged".to_string(),
            needs_clarification: false,
            clarifying_questions: Vec::new(),
            direct_answer: Some(
                "I'm sorry, the service is experiencing heavy load right now. \
                 Please try again in a moment."
                    .to_string(),
            ),
            overloaded: true,
            agent_selection: Vec::new(),
        }
    }

    /// The safe default when classification fails for any reason.
    pub fn fallback() -> Self {
        Self {
            strategy: Strategy::SingleAgent,
            rationale: "decision error, defaulting".to_string(),
            needs_clarification: false,
            clarifying_questions: Vec::new(),
            direct_answer: None,
            overloaded: false,
            agent_selection: Vec::new(),
        }
    }

    /// Coerce shapes the classifier should not produce into valid ones:
    /// a clarification cannot ride on the direct strategy, and a direct
    /// decision without an answer has nothing to say.
    pub fn normalized(mut self) -> Self {
        if self.needs_clarification && self.strategy == Strategy::Direct {
            warn!("clarification requested on direct strategy, coercing to single_agent");
            self.strategy = Strategy::SingleAgent;
            self.direct_answer = None;
        }

        if self.strategy == Strategy::Direct && !self.overloaded {
            let empty = self
                .direct_answer
                .as_deref()
                .map(|a| a.trim().is_empty())
                .unwrap_or(true);
            if empty {
                warn!("direct decision without an answer, coercing to single_agent");
                self.strategy = Strategy::SingleAgent;
                self.direct_answer = None;
            }
        }

        self
    }
}

/// A suspended strategy waiting on the user's clarification answer.
/// Keyed by conversation id, read once on the next query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingClarification {
    pub query_id: String,
    pub strategy: Strategy,
    #[serde(default)]
    pub agent_selection: Vec<String>,
}
