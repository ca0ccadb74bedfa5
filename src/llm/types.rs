//! Conversation and tool-calling types
//!
//! This module defines the provider-independent types exchanged between the
//! orchestrator, the providers and the tool backend. Every provider translates
//! these into its own wire format and back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply substituted for a successful but blank assistant turn
pub const EMPTY_RESPONSE_APOLOGY: &str =
    "Sorry, I couldn't come up with a response to that. Could you try rephrasing?";

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions
    System,
    /// Chat participant
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Result of a tool invocation
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in the conversation
///
/// Messages are value objects: once created they are only ever cloned into
/// history snapshots, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Text content of the message
    pub content: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Tool calls made by the assistant (only for Assistant role)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool call ID this message responds to (only for Tool role)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: MessageRole, content: String) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Creates a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content.into())
    }

    /// Creates a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into())
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into())
    }

    /// Creates an assistant message carrying the tool calls it requested
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(MessageRole::Assistant, content.into())
        }
    }

    /// Creates a tool result message
    pub fn tool_response(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(MessageRole::Tool, content.into())
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool call requested by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier correlating the call with its result, unique per response
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// Arguments to pass to the tool (JSON object)
    pub arguments: Value,
    /// Optional text the model emitted alongside the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            reasoning: None,
        }
    }

    /// Generates a call id for providers that do not assign one
    pub fn generate_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// Canonical, provider-independent description of a callable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's arguments
    #[serde(rename = "inputSchema", alias = "input_schema", alias = "parameters")]
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Names listed in the schema's `required` array
    pub fn required_arguments(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Neutral JSON form accepted by every tool converter
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

/// Parsed reply from a provider
///
/// `successful == false` means callers must ignore `content` and look at
/// `error_message` instead. When `tool_calls` is non-empty, `content` is the
/// (possibly empty) text the model emitted alongside the calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub provider_name: String,
    pub model: String,
}

impl AIResponse {
    /// Creates a successful text-only response
    pub fn text(
        content: impl Into<String>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_tool_calls(content, Vec::new(), provider_name, model)
    }

    /// Creates a successful response carrying tool calls
    pub fn with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            successful: true,
            error_message: None,
            provider_name: provider_name.into(),
            model: model.into(),
        }
    }

    /// Creates a failed response
    pub fn failure(
        error_message: impl Into<String>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            content: String::new(),
            tool_calls: Vec::new(),
            successful: false,
            error_message: Some(error_message.into()),
            provider_name: provider_name.into(),
            model: model.into(),
        }
    }

    /// Returns true if the response contains tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Replaces blank text of a successful, tool-free response with an apology
    pub fn ensure_content(mut self) -> Self {
        if self.successful && self.tool_calls.is_empty() && self.content.trim().is_empty() {
            self.content = EMPTY_RESPONSE_APOLOGY.to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_creation() {
        let system = ChatMessage::system("You are a helpful assistant");
        assert_eq!(system.role, MessageRole::System);
        assert_eq!(system.content, "You are a helpful assistant");

        let user = ChatMessage::user("Hello");
        assert_eq!(user.role, MessageRole::User);

        let assistant = ChatMessage::assistant("Hi there!");
        assert_eq!(assistant.role, MessageRole::Assistant);
        assert!(!assistant.has_tool_calls());
    }

    #[test]
    fn test_tool_response() {
        let response = ChatMessage::tool_response("call_123", "16 bread given");
        assert_eq!(response.role, MessageRole::Tool);
        assert_eq!(response.tool_call_id.as_deref(), Some("call_123"));
    }

    #[test]
    fn test_assistant_with_tools() {
        let call = ToolCall::new("call_1", "give_item", json!({"item": "bread", "count": 16}));
        let msg = ChatMessage::assistant_with_tools("", vec![call]);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_tool_definition_accepts_schema_aliases() {
        let neutral: ToolDefinition = serde_json::from_value(json!({
            "name": "give_item",
            "description": "Give an item",
            "inputSchema": {"type": "object"}
        }))
        .unwrap();
        let snake: ToolDefinition = serde_json::from_value(json!({
            "name": "give_item",
            "input_schema": {"type": "object"}
        }))
        .unwrap();

        assert_eq!(neutral.input_schema, snake.input_schema);
        assert_eq!(snake.description, "");
    }

    #[test]
    fn test_required_arguments() {
        let tool = ToolDefinition::new(
            "give_item",
            "Give an item",
            json!({"type": "object", "required": ["item", "count"]}),
        );
        assert_eq!(tool.required_arguments(), vec!["item", "count"]);
    }

    #[test]
    fn test_ensure_content_replaces_blank_text() {
        let response = AIResponse::text("   \n", "ollama", "llama3").ensure_content();
        assert_eq!(response.content, EMPTY_RESPONSE_APOLOGY);
    }

    #[test]
    fn test_ensure_content_keeps_empty_preamble_with_tool_calls() {
        let call = ToolCall::new("1", "give_item", json!({}));
        let response =
            AIResponse::with_tool_calls("", vec![call], "openai", "gpt-4o").ensure_content();
        assert_eq!(response.content, "");
    }

    #[test]
    fn test_failure_response() {
        let response = AIResponse::failure("boom", "anthropic", "claude");
        assert!(!response.successful);
        assert_eq!(response.error_message.as_deref(), Some("boom"));
    }
}
