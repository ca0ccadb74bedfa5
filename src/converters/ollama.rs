use serde_json::Value;

use super::normalize::is_object_schema;
use super::{function_call, function_tool, non_empty_str, ToolConverter};
use crate::llm::ToolCall;

/// Converter for Ollama's `/api/chat` tools
///
/// Ollama takes the same function-wrapped tool shape as OpenAI, but its tool
/// calls carry arguments as a JSON object and usually have no id.
#[derive(Debug, Default, Clone, Copy)]
pub struct OllamaToolConverter;

impl ToolConverter for OllamaToolConverter {
    fn provider_name(&self) -> &'static str {
        "ollama"
    }

    fn convert_tool(&self, tool: &Value) -> Option<Value> {
        function_tool(self.provider_name(), tool)
    }

    fn convert_tool_result(&self, native: &Value) -> Option<ToolCall> {
        function_call(native)
    }

    fn validate_tool(&self, tool: &Value) -> bool {
        non_empty_str(tool.pointer("/function/name")).is_some()
            && is_object_schema(tool.pointer("/function/parameters"))
    }
}
