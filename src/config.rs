//! Engine Configuration
//!
//! Configuration for the query orchestration engine, loadable from TOML.
//! Every section has defaults so an empty document yields a working setup.

use serde::{Deserialize, Serialize};

use crate::utils::error::{EngineError, EngineResult};

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub attachments: AttachmentConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Agent profiles available for routing
    #[serde(default)]
    pub agents: Vec<AgentProfileConfig>,
}

/// Model selection and sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier sent to the provider
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Agentic loop and admission control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Hard cap on model round-trips per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Concurrent runs admitted engine-wide
    #[serde(default = "default_gate_capacity")]
    pub gate_capacity: usize,
    /// Conversation turns kept when assembling history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Tool names that require explicit user approval before running
    #[serde(default)]
    pub guarded_tools: Vec<String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_iterations() -> u32 {
    10
}

fn default_gate_capacity() -> usize {
    2
}

fn default_history_limit() -> usize {
    20
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            gate_capacity: default_gate_capacity(),
            history_limit: default_history_limit(),
            guarded_tools: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

/// Backoff schedule for transient upstream failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub max_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    2_000
}

fn default_retry_max_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_ms(),
            max_delay_ms: default_retry_max_ms(),
        }
    }
}

/// Circuit breaker cooldown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Seconds the breaker stays open after an overload trip
    #[serde(default = "default_breaker_reset_secs")]
    pub reset_after_secs: u64,
}

fn default_breaker_reset_secs() -> u64 {
    30
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            reset_after_secs: default_breaker_reset_secs(),
        }
    }
}

/// Prompt cache marker placement thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Minimum estimated tokens before a segment is worth marking
    #[serde(default = "default_cache_min_tokens")]
    pub min_tokens: u32,
    /// Raised minimum for small or fast model variants
    #[serde(default = "default_cache_min_tokens_small")]
    pub min_tokens_small_fast: u32,
    /// Provider-imposed cap on markers per request
    #[serde(default = "default_marker_ceiling")]
    pub marker_ceiling: usize,
    /// Turns a history block must span before it is cacheable
    #[serde(default = "default_cache_min_history_turns")]
    pub min_history_turns: usize,
    /// Character floor for that history block
    #[serde(default = "default_cache_min_history_chars")]
    pub min_history_chars: usize,
}

fn default_cache_min_tokens() -> u32 {
    1024
}

fn default_cache_min_tokens_small() -> u32 {
    2048
}

fn default_marker_ceiling() -> usize {
    4
}

fn default_cache_min_history_turns() -> usize {
    3
}

fn default_cache_min_history_chars() -> usize {
    2000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_tokens: default_cache_min_tokens(),
            min_tokens_small_fast: default_cache_min_tokens_small(),
            marker_ceiling: default_marker_ceiling(),
            min_history_turns: default_cache_min_history_turns(),
            min_history_chars: default_cache_min_history_chars(),
        }
    }
}

/// Attachment readiness polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Overall deadline for all attachments of one query
    #[serde(default = "default_attachment_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1_500
}

fn default_attachment_timeout_secs() -> u64 {
    180
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_attachment_timeout_secs(),
        }
    }
}

/// Update delivery retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Attempts for a transiently failing push before giving up
    #[serde(default = "default_delivery_retries")]
    pub max_retries: u32,
    #[serde(default = "default_delivery_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_delivery_retries() -> u32 {
    3
}

fn default_delivery_delay_ms() -> u64 {
    200
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_delivery_retries(),
            retry_delay_ms: default_delivery_delay_ms(),
        }
    }
}

/// One routable agent profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfileConfig {
    pub name: String,
    /// Human-facing label, derived from the name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Shown to the decision model when selecting an agent
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
    /// Tool names this agent may call, empty for no restriction
    #[serde(default)]
    pub tools: Vec<String>,
    /// Long-lived sessions qualify for the extended cache tier
    #[serde(default)]
    pub long_running: bool,
}

impl EngineConfig {
    /// Parse a TOML document and validate the result
    pub fn from_toml_str(input: &str) -> EngineResult<Self> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| EngineError::config(e.to_string()))?;
        config.validate().map_err(EngineError::Config)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.executor.max_iterations == 0 {
            return Err("executor.max_iterations must be at least 1".to_string());
        }

        if self.executor.gate_capacity == 0 {
            return Err("executor.gate_capacity must be at least 1".to_string());
        }

        if self.executor.retry.max_attempts == 0 {
            return Err("executor.retry.max_attempts must be at least 1".to_string());
        }

        if self.executor.retry.base_delay_ms > self.executor.retry.max_delay_ms {
            return Err("executor.retry.base_delay_ms cannot exceed max_delay_ms".to_string());
        }

        if self.cache.marker_ceiling == 0 || self.cache.marker_ceiling > 4 {
            return Err("cache.marker_ceiling must be between 1 and 4".to_string());
        }

        if self.attachments.poll_interval_ms == 0 {
            return Err("attachments.poll_interval_ms must be nonzero".to_string());
        }

        if self.breaker.reset_after_secs == 0 {
            return Err("breaker.reset_after_secs must be nonzero".to_string());
        }

        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err("agents entries must have a nonempty name".to_string());
            }
        }

        Ok(())
    }
}
