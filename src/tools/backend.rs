use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ToolExecutionError;
use crate::llm::ToolDefinition;

/// Textual result of a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    /// The tool ran but reported a failure in `content`
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Renders a JSON value, keeping plain strings unquoted
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::text(text.clone()),
            other => Self::text(other.to_string()),
        }
    }
}

/// The external tool-execution backend
///
/// The orchestrator only depends on listing and invoking; how the backend is
/// reached (in-process registry, JSON-RPC over HTTP) is up to the
/// implementation.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolExecutionError>;

    async fn invoke(&self, name: &str, arguments: &Value)
        -> Result<ToolOutput, ToolExecutionError>;

    fn describe(&self) -> String;
}
