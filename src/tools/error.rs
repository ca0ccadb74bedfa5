use thiserror::Error;

/// Failures of a single tool invocation
///
/// These never abort a conversation turn; the orchestrator records them as
/// `tool`-role history entries and lets the model react.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolExecutionError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool '{tool}' timed out after {millis}ms")]
    Timeout { tool: String, millis: u64 },

    #[error("tool '{tool}' failed: {message}")]
    Failed { tool: String, message: String },

    #[error("tool backend unreachable: {0}")]
    Transport(String),

    #[error("malformed tool backend response: {0}")]
    Protocol(String),
}
