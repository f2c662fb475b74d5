//! Agent Registry
//!
//! Named agent profiles loaded from configuration. The decision engine
//! selects profiles by name, the executor applies their instructions and
//! tool filter, and the normalizer resolves display names through here.

use std::collections::HashMap;

use switchboard_llm::ToolSpec;

use crate::config::AgentProfileConfig;

/// One routable agent and everything the executor needs to run as it.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub instructions: String,
    /// Tool names this agent may call, empty for no restriction
    pub tools: Vec<String>,
    pub long_running: bool,
}

impl AgentProfile {
    pub fn allows_tool(&self, tool_name: &str) -> bool {
        self.tools.is_empty() || self.tools.iter().any(|t| t == tool_name)
    }

    /// Restrict a catalog to this agent's allowed tools.
    pub fn filter_catalog(&self, catalog: Vec<ToolSpec>) -> Vec<ToolSpec> {
        if self.tools.is_empty() {
            return catalog;
        }
        catalog
            .into_iter()
            .filter(|tool| self.allows_tool(&tool.name))
            .collect()
    }
}

/// "data_analyst" -> "Data Analyst"
pub(crate) fn title_case(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

const DEFAULT_AGENT_NAME: &str = "assistant";
const DEFAULT_INSTRUCTIONS: &str =
    "You are a capable assistant. Use the available tools when they help answer \
     the user's request, and answer directly when they do not.";

/// Lookup table of configured agent profiles.
pub struct AgentRegistry {
    profiles: HashMap<String, AgentProfile>,
    /// Configuration order, kept for the decision prompt
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn from_config(configs: &[AgentProfileConfig]) -> Self {
        let mut profiles = HashMap::new();
        let mut order = Vec::new();
        for config in configs {
            let profile = AgentProfile {
                name: config.name.clone(),
                display_name: config
                    .display_name
                    .clone()
                    .unwrap_or_else(|| title_case(&config.name)),
                description: config.description.clone(),
                instructions: config.system_prompt.clone(),
                tools: config.tools.clone(),
                long_running: config.long_running,
            };
            order.push(profile.name.clone());
            profiles.insert(profile.name.clone(), profile);
        }
        Self { profiles, order }
    }

    pub fn get(&self, name: &str) -> Option<&AgentProfile> {
        self.profiles.get(name)
    }

    pub fn display_name(&self, name: &str) -> Option<&str> {
        self.profiles.get(name).map(|p| p.display_name.as_str())
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Built-in profile used when nothing is configured or a selection
    /// names an unknown agent.
    pub fn default_profile(&self) -> AgentProfile {
        AgentProfile {
            name: DEFAULT_AGENT_NAME.to_string(),
            display_name: title_case(DEFAULT_AGENT_NAME),
            description: "General-purpose assistant".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            tools: Vec::new(),
            long_running: false,
        }
    }

    /// First known profile in a selection, or the built-in default.
    pub fn resolve_or_default(&self, selection: &[String]) -> AgentProfile {
        selection
            .iter()
            .find_map(|name| self.profiles.get(name).cloned())
            .unwrap_or_else(|| self.default_profile())
    }

    /// One line per agent, fed to the decision model so it can route.
    pub fn describe_for_routing(&self) -> String {
        if self.order.is_empty() {
            return format!("- {}: general-purpose assistant", DEFAULT_AGENT_NAME);
        }
        self.order
            .iter()
            .filter_map(|name| self.profiles.get(name))
            .map(|p| {
                if p.description.is_empty() {
                    format!("- {}", p.name)
                } else {
                    format!("- {}: {}", p.name, p.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
