use serde_json::Value;

use super::normalize::is_object_schema;
use super::{function_call, function_tool, non_empty_str, ToolConverter};
use crate::llm::ToolCall;

/// Converter for the OpenAI chat-completions `tools` array
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAIToolConverter;

impl ToolConverter for OpenAIToolConverter {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn convert_tool(&self, tool: &Value) -> Option<Value> {
        function_tool(self.provider_name(), tool)
    }

    /// Accepts `{id, type, function: {name, arguments}}`, where `arguments`
    /// is usually a JSON-encoded string
    fn convert_tool_result(&self, native: &Value) -> Option<ToolCall> {
        function_call(native)
    }

    fn validate_tool(&self, tool: &Value) -> bool {
        tool.get("type").and_then(Value::as_str) == Some("function")
            && non_empty_str(tool.pointer("/function/name")).is_some()
            && is_object_schema(tool.pointer("/function/parameters"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_neutral_tool() {
        let converted = OpenAIToolConverter
            .convert_tool(&json!({
                "name": "give_item",
                "description": "Give an item",
                "inputSchema": {"type": "object", "properties": {"item": {"type": "string"}}}
            }))
            .unwrap();

        assert_eq!(converted["type"], "function");
        assert_eq!(converted["function"]["name"], "give_item");
        assert_eq!(
            converted["function"]["parameters"]["properties"]["item"]["type"],
            "string"
        );
        assert!(OpenAIToolConverter.validate_tool(&converted));
    }

    #[test]
    fn test_already_wrapped_tool_is_not_double_wrapped() {
        let wrapped = json!({
            "type": "function",
            "function": {"name": "ping", "parameters": {"type": "object", "properties": {}}}
        });
        let converted = OpenAIToolConverter.convert_tool(&wrapped).unwrap();
        assert!(converted["function"].get("function").is_none());
        assert_eq!(converted["function"]["name"], "ping");
    }

    #[test]
    fn test_batch_skips_invalid_tools() {
        let tools = vec![
            json!({"name": "ok"}),
            json!({"type": "function"}),
            json!({"description": "no name"}),
        ];
        let converted = OpenAIToolConverter.convert_tools(&tools);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0]["function"]["name"], "ok");
    }

    #[test]
    fn test_tool_call_with_string_arguments() {
        let call = OpenAIToolConverter
            .convert_tool_result(&json!({
                "id": "call_abc",
                "type": "function",
                "function": {"name": "give_item", "arguments": "{\"item\":\"bread\",\"count\":16}"}
            }))
            .unwrap();

        assert_eq!(call.id, "call_abc");
        assert_eq!(call.name, "give_item");
        assert_eq!(call.arguments["count"], 16);
    }

    #[test]
    fn test_tool_call_without_name_is_dropped() {
        assert!(OpenAIToolConverter
            .convert_tool_result(&json!({"id": "x", "function": {"arguments": "{}"}}))
            .is_none());
    }

    #[test]
    fn test_validate_rejects_neutral_shape() {
        assert!(!OpenAIToolConverter.validate_tool(&json!({
            "name": "give_item",
            "inputSchema": {"type": "object"}
        })));
    }
}
