//! Tool Outcomes
//!
//! The uniform result shape every tool invocation collapses into before it
//! is fed back to the model.

use serde::{Deserialize, Serialize};

/// Result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    /// Output text shown to the model on success.
    pub output: String,
    /// Failure description shown to the model on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Text fed back to the model as the tool-result turn. Failures are
    /// phrased so the model can adjust rather than repeat the call verbatim.
    pub fn to_content(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("tool execution failed")
            )
        }
    }
}
