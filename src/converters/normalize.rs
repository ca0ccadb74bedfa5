//! Boundary normalization of tool descriptions
//!
//! Tool lists reach the converters either in the neutral form served by the
//! tool backend (`name`/`description`/`inputSchema`), wrapped in a
//! `function` object by an earlier conversion, or already in Anthropic's
//! `input_schema` form. Everything is classified into a [`ToolShape`] and
//! normalized into a [`ToolDefinition`] before any provider-specific output
//! is produced. Inputs that fit no shape are rejected, not guessed at.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::llm::ToolDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolFormatError {
    #[error("tool description is not a JSON object")]
    NotAnObject,

    #[error("tool has no name")]
    MissingName,

    #[error("function-typed tool has no function body")]
    MissingFunctionBody,

    #[error("tool schema for '{0}' is not a JSON object")]
    InvalidSchema(String),
}

/// Recognized input shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolShape {
    /// `{name, description, inputSchema | parameters}`
    Neutral,
    /// `{type: "function", function: {name, description, parameters}}`
    FunctionWrapped,
    /// `{name, description, input_schema}`
    AnthropicNative,
}

/// Classifies a tool description by the presence of its wrapper fields
pub fn classify(tool: &Value) -> Result<ToolShape, ToolFormatError> {
    let object = tool.as_object().ok_or(ToolFormatError::NotAnObject)?;

    if let Some(function) = object.get("function") {
        return if function.is_object() {
            Ok(ToolShape::FunctionWrapped)
        } else {
            Err(ToolFormatError::MissingFunctionBody)
        };
    }

    if object.get("type").and_then(Value::as_str) == Some("function") {
        return Err(ToolFormatError::MissingFunctionBody);
    }

    if object.contains_key("input_schema") {
        Ok(ToolShape::AnthropicNative)
    } else {
        Ok(ToolShape::Neutral)
    }
}

/// Normalizes any accepted shape into the canonical definition
pub fn normalize_tool(tool: &Value) -> Result<ToolDefinition, ToolFormatError> {
    let shape = classify(tool)?;

    let (body, schema_keys): (&Value, &[&str]) = match shape {
        ToolShape::FunctionWrapped => (
            &tool["function"],
            &["parameters", "inputSchema", "input_schema"],
        ),
        ToolShape::AnthropicNative => (tool, &["input_schema"]),
        ToolShape::Neutral => (tool, &["inputSchema", "parameters"]),
    };

    let name = body
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(ToolFormatError::MissingName)?
        .to_string();

    let description = body
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let raw_schema = schema_keys
        .iter()
        .find_map(|key| body.get(*key).filter(|v| !v.is_null()));

    let input_schema = canonical_schema(raw_schema, &name)?;

    Ok(ToolDefinition {
        name,
        description,
        input_schema,
    })
}

/// Fills in the object type and property map a schema must carry
fn canonical_schema(schema: Option<&Value>, tool_name: &str) -> Result<Value, ToolFormatError> {
    let mut map = match schema {
        None => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(ToolFormatError::InvalidSchema(tool_name.to_string())),
    };

    map.entry("type").or_insert_with(|| json!("object"));
    if map.get("type").and_then(Value::as_str) == Some("object") {
        map.entry("properties").or_insert_with(|| json!({}));
    }

    Ok(Value::Object(map))
}

/// Whether `value` is a JSON-schema object describing an object type
pub(crate) fn is_object_schema(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_object)
        .map(|schema| schema.get("type").and_then(Value::as_str) == Some("object"))
        .unwrap_or(false)
}

/// Parses tool arguments that may arrive as a JSON-encoded string
pub(crate) fn parse_arguments(raw: Option<&Value>) -> Value {
    match raw {
        None | Some(Value::Null) => json!({}),
        Some(Value::String(text)) if text.trim().is_empty() => json!({}),
        Some(Value::String(text)) => {
            serde_json::from_str(text).unwrap_or_else(|_| json!({ "_raw": text }))
        }
        Some(other) => other.clone(),
    }
}
