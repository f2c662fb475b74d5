//! Prompt Cache Planner
//!
//! Decides which request segments carry a cache marker and for how long.
//! Purely a per-request computation: it annotates the outgoing system
//! blocks, tool catalog, and message list, and touches nothing shared.
//!
//! A marker on a block caches the whole request prefix up to that block,
//! so each chosen segment is marked on its final element.

use switchboard_llm::{CacheControl, ChatMessage, Role, SystemBlock, ToolSpec};
use tracing::debug;

use crate::config::CacheConfig;

/// Model-name fragments that identify small or fast variants, which need
/// a larger prompt before caching pays for itself.
const SMALL_FAST_MARKERS: &[&str] = &["haiku", "mini", "flash", "lite", "nano", "small"];

/// Keywords counted when sniffing workflow-context user content.
const WORKFLOW_KEYWORDS: &[&str] = &[
    "tool", "step", "agent", "task", "workflow", "plan", "input", "output",
];

/// Rough chars-to-tokens conversion used throughout.
pub fn estimate_tokens(chars: usize) -> u32 {
    (chars / 4) as u32
}

/// Whether the model variant needs the raised cache threshold.
pub fn is_small_fast_model(model: &str) -> bool {
    let lower = model.to_lowercase();
    SMALL_FAST_MARKERS.iter().any(|m| lower.contains(m))
}

/// Heuristic for user content that is really reusable workflow context:
/// repeated `tool:`/`step:`-style lines, or a high density of
/// orchestration keywords.
fn looks_like_workflow_context(text: &str) -> bool {
    let structured_lines = text
        .lines()
        .filter(|line| {
            let t = line.trim_start().to_lowercase();
            t.starts_with("tool:")
                || t.starts_with("step:")
                || t.starts_with("agent:")
                || t.starts_with("task:")
        })
        .count();
    if structured_lines >= 3 {
        return true;
    }

    let lower = text.to_lowercase();
    let words = lower.split_whitespace().count().max(1);
    let hits: usize = WORKFLOW_KEYWORDS
        .iter()
        .map(|k| lower.matches(k).count())
        .sum();
    hits >= 8 && hits * 100 / words >= 4
}

/// Plans cache marker placement for one executor call.
pub struct PromptCachePlanner {
    config: CacheConfig,
}

impl PromptCachePlanner {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// Minimum estimated tokens a segment needs before marking it is
    /// worth the fixed overhead.
    pub fn min_tokens_for(&self, model: &str) -> u32 {
        if is_small_fast_model(model) {
            self.config.min_tokens_small_fast
        } else {
            self.config.min_tokens
        }
    }

    fn tier_for_static_segment(&self, long_running: bool) -> CacheControl {
        if long_running {
            CacheControl::long()
        } else {
            CacheControl::short()
        }
    }

    /// Annotates the request in priority order: tool catalog, system
    /// instructions, the oldest history block, then workflow-context user
    /// turns, stopping at the provider's marker ceiling. Already-marked
    /// segments are left alone, so replanning is idempotent.
    pub fn plan(
        &self,
        system: &mut [SystemBlock],
        tools: &mut [ToolSpec],
        messages: &mut [ChatMessage],
        model: &str,
        long_running: bool,
    ) {
        let threshold = self.min_tokens_for(model);
        let existing = system.iter().filter(|b| b.cache_control.is_some()).count()
            + tools.iter().filter(|t| t.cache_control.is_some()).count()
            + messages
                .iter()
                .filter(|m| m.cache_control.is_some())
                .count();
        let mut budget = self.config.marker_ceiling.saturating_sub(existing);

        // 1. Tool catalog: static across a conversation, highest value.
        if budget > 0 && !tools.iter().any(|t| t.cache_control.is_some()) {
            let chars: usize = tools.iter().map(|t| t.char_len()).sum();
            if estimate_tokens(chars) >= threshold {
                if let Some(last) = tools.last_mut() {
                    last.cache_control = Some(self.tier_for_static_segment(long_running));
                    budget -= 1;
                }
            }
        }

        // 2. System instructions.
        if budget > 0 && !system.iter().any(|b| b.cache_control.is_some()) {
            let chars: usize = system.iter().map(|b| b.text.len()).sum();
            if estimate_tokens(chars) >= threshold {
                if let Some(last) = system.last_mut() {
                    last.cache_control = Some(self.tier_for_static_segment(long_running));
                    budget -= 1;
                }
            }
        }

        // 3. Oldest contiguous history block: everything before the newest
        //    turn, once the conversation is deep and heavy enough.
        if budget > 0 && messages.len() >= 2 {
            let history_end = messages.len() - 1;
            let block = &messages[..history_end];
            let already_marked = block.iter().any(|m| m.cache_control.is_some());
            if !already_marked && block.len() >= self.config.min_history_turns {
                let chars: usize = block.iter().map(|m| m.char_len()).sum();
                if chars > self.config.min_history_chars && estimate_tokens(chars) >= threshold {
                    messages[history_end - 1].cache_control =
                        Some(self.tier_for_static_segment(long_running));
                    budget -= 1;
                }
            }
        }

        // 4. Remaining large workflow-context user turns. These change
        //    between calls, so they never get the long tier.
        if budget > 0 {
            for message in messages.iter_mut() {
                if budget == 0 {
                    break;
                }
                if message.cache_control.is_some() || message.role != Role::User {
                    continue;
                }
                if estimate_tokens(message.char_len()) < threshold {
                    continue;
                }
                if looks_like_workflow_context(&message.text()) {
                    message.cache_control = Some(CacheControl::short());
                    budget -= 1;
                }
            }
        }

        debug!(
            markers = self.config.marker_ceiling.saturating_sub(budget),
            threshold, "cache plan computed"
        );
    }
}
