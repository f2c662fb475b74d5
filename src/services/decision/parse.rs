//! Decision Parsing
//!
//! Tolerant extraction of the classifier's structured reply. Anything
//! unusable returns `None` and the caller falls back.

use serde::Deserialize;

use crate::models::{Decision, Strategy};
use crate::services::planner::extract_json_value;

/// The shape the classification prompt asks for. Every field is optional so
/// a partially-conforming reply still parses.
#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    case: Option<u8>,
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    direct_answer: Option<String>,
    #[serde(default)]
    needs_clarification: bool,
    #[serde(default)]
    clarifying_questions: Vec<String>,
    #[serde(default, alias = "agent_selection")]
    agents: Vec<String>,
}

fn strategy_from_name(name: &str) -> Option<Strategy> {
    name.trim().to_ascii_lowercase().replace('-', "_").parse().ok()
}

fn strategy_from_case(case: u8) -> Option<Strategy> {
    match case {
        1 => Some(Strategy::Direct),
        2 => Some(Strategy::SingleAgent),
        3 => Some(Strategy::Planned),
        _ => None,
    }
}

/// Parses classifier text into a `Decision`. The strategy name wins over the
/// case number when both are present and disagree.
pub(super) fn parse_decision(text: &str) -> Option<Decision> {
    let value = extract_json_value(text)?;
    let raw: RawDecision = serde_json::from_value(value).ok()?;

    let strategy = raw
        .strategy
        .as_deref()
        .and_then(strategy_from_name)
        .or_else(|| raw.case.and_then(strategy_from_case))?;

    let clarifying_questions: Vec<String> = raw
        .clarifying_questions
        .into_iter()
        .filter(|q| !q.trim().is_empty())
        .collect();

    Some(Decision {
        strategy,
        rationale: raw.rationale.unwrap_or_default(),
        needs_clarification: raw.needs_clarification && !clarifying_questions.is_empty(),
        clarifying_questions,
        direct_answer: raw.direct_answer,
        overloaded: false,
        agent_selection: raw.agents,
    })
}
