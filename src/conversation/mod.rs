//! Conversation turns and tool-call orchestration

mod config;
mod orchestrator;

pub use config::ConversationSettings;
pub use orchestrator::{
    tool_limit_summary, validate_arguments, ConversationOrchestrator, TurnOutcome, TurnStatus,
    TECHNICAL_DIFFICULTIES_MESSAGE,
};
