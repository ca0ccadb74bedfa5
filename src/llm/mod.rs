//! Provider-independent conversation model
//!
//! This module holds the neutral message, tool and response types plus the
//! bounded history that conversation scopes share across turns.

mod history;
mod types;

pub use history::{MessageHistory, DEFAULT_MAX_HISTORY};
pub use types::{
    AIResponse, ChatMessage, MessageRole, ToolCall, ToolDefinition, EMPTY_RESPONSE_APOLOGY,
};
