//! Tool-format converters
//!
//! Each provider describes tools, and reports the calls a model wants to
//! make, in its own JSON dialect. A [`ToolConverter`] translates the neutral
//! tool descriptions into that dialect and native tool-call payloads back into
//! [`ToolCall`]s. All inputs pass through [`normalize::normalize_tool`] first,
//! so a converter only ever deals with one canonical shape.
//!
//! A tool that cannot be converted is skipped with a warning; it never aborts
//! the whole batch.

mod anthropic;
mod factory;
pub mod normalize;
mod ollama;
mod openai;

pub use anthropic::AnthropicToolConverter;
pub use factory::ConverterFactory;
pub use normalize::{normalize_tool, ToolFormatError, ToolShape};
pub use ollama::OllamaToolConverter;
pub use openai::OpenAIToolConverter;

use serde_json::{json, Value};
use tracing::warn;

use self::normalize::parse_arguments;
use crate::llm::{ToolCall, ToolDefinition};

pub trait ToolConverter: Send + Sync + std::fmt::Debug {
    /// Provider this converter targets
    fn provider_name(&self) -> &'static str;

    /// Converts one tool description into the provider's format
    fn convert_tool(&self, tool: &Value) -> Option<Value>;

    /// Converts a batch, dropping the tools that fail conversion
    fn convert_tools(&self, tools: &[Value]) -> Vec<Value> {
        tools
            .iter()
            .enumerate()
            .filter_map(|(index, tool)| {
                let converted = self.convert_tool(tool);
                if converted.is_none() {
                    warn!(
                        provider = self.provider_name(),
                        index,
                        "Skipping tool that could not be converted"
                    );
                }
                converted
            })
            .collect()
    }

    /// Converts canonical definitions via their neutral JSON form
    fn convert_definitions(&self, tools: &[ToolDefinition]) -> Vec<Value> {
        let neutral: Vec<Value> = tools.iter().map(ToolDefinition::to_value).collect();
        self.convert_tools(&neutral)
    }

    /// Extracts a neutral tool call from a native tool-call payload
    fn convert_tool_result(&self, native: &Value) -> Option<ToolCall>;

    /// Structural check that `tool` is a valid description in this format
    fn validate_tool(&self, tool: &Value) -> bool;
}

/// Normalizes `tool`, logging why it was rejected
pub(crate) fn normalized_or_warn(provider: &str, tool: &Value) -> Option<ToolDefinition> {
    match normalize_tool(tool) {
        Ok(def) => Some(def),
        Err(e) => {
            warn!(provider, error = %e, "Rejected tool description");
            None
        }
    }
}

pub(crate) fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Function-wrapped tool shape shared by OpenAI and Ollama
pub(crate) fn function_tool(provider: &str, tool: &Value) -> Option<Value> {
    let def = normalized_or_warn(provider, tool)?;
    Some(json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.input_schema,
        }
    }))
}

/// Reads `{id?, function: {name, arguments}}`; `arguments` may be an object
/// or a JSON-encoded string, and a missing id is generated
pub(crate) fn function_call(native: &Value) -> Option<ToolCall> {
    let function = native.get("function").unwrap_or(native);
    let name = non_empty_str(function.get("name"))?;
    let arguments = parse_arguments(function.get("arguments"));
    let id = non_empty_str(native.get("id"))
        .map(str::to_string)
        .unwrap_or_else(ToolCall::generate_id);

    Some(ToolCall::new(id, name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_wrapped_providers_agree() {
        let tool = json!({
            "name": "give_item",
            "description": "Give an item",
            "inputSchema": {"type": "object", "properties": {"item": {"type": "string"}}}
        });
        assert_eq!(
            OpenAIToolConverter.convert_tool(&tool),
            OllamaToolConverter.convert_tool(&tool)
        );

        let native = json!({
            "id": "call_7",
            "function": {"name": "give_item", "arguments": "{\"item\": \"bread\"}"}
        });
        assert_eq!(
            OpenAIToolConverter.convert_tool_result(&native),
            OllamaToolConverter.convert_tool_result(&native)
        );
        assert_eq!(
            function_call(&native).unwrap().arguments,
            json!({"item": "bread"})
        );
    }
}
