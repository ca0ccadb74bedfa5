use serde_json::{json, Value};

use super::normalize::{is_object_schema, parse_arguments};
use super::{non_empty_str, normalized_or_warn, ToolConverter};
use crate::llm::ToolCall;

/// Converter for the Anthropic Messages API
///
/// Tools are flat `{name, description, input_schema}` objects and calls come
/// back as `tool_use` content blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnthropicToolConverter;

impl ToolConverter for AnthropicToolConverter {
    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    fn convert_tool(&self, tool: &Value) -> Option<Value> {
        let def = normalized_or_warn(self.provider_name(), tool)?;
        Some(json!({
            "name": def.name,
            "description": def.description,
            "input_schema": def.input_schema,
        }))
    }

    fn convert_tool_result(&self, native: &Value) -> Option<ToolCall> {
        if let Some(kind) = native.get("type").and_then(Value::as_str) {
            if kind != "tool_use" {
                return None;
            }
        }

        let name = non_empty_str(native.get("name"))?;
        let arguments = parse_arguments(native.get("input"));
        let id = non_empty_str(native.get("id"))
            .map(str::to_string)
            .unwrap_or_else(ToolCall::generate_id);

        Some(ToolCall::new(id, name, arguments))
    }

    fn validate_tool(&self, tool: &Value) -> bool {
        non_empty_str(tool.get("name")).is_some() && is_object_schema(tool.get("input_schema"))
    }
}
