//! JSON-RPC 2.0 tool backend
//!
//! Speaks the `tools/list` / `tools/call` methods over HTTP POST. Listed
//! tools are normalized like any other tool input; call results are the
//! concatenated `text` parts of the returned `content` array, with `isError`
//! marking tool-level failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::backend::{ToolBackend, ToolOutput};
use super::error::ToolExecutionError;
use crate::converters::normalize_tool;
use crate::llm::ToolDefinition;

pub struct JsonRpcToolBackend {
    endpoint: String,
    client: Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcToolBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ToolExecutionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolExecutionError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ToolExecutionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(endpoint = %self.endpoint, method, id, "Sending JSON-RPC request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolExecutionError::Transport(format!(
                        "request timed out after {:?}",
                        self.timeout
                    ))
                } else {
                    ToolExecutionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolExecutionError::Transport(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolExecutionError::Protocol(e.to_string()))?;

        unwrap_rpc(body)
    }
}

/// Extracts `result` from a JSON-RPC response, turning `error` into a failure
pub(crate) fn unwrap_rpc(mut body: Value) -> Result<Value, ToolExecutionError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ToolExecutionError::Protocol(format!(
            "JSON-RPC error {}: {}",
            code, message
        )));
    }

    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(ToolExecutionError::Protocol(
            "response has neither result nor error".to_string(),
        )),
    }
}

pub(crate) fn parse_tool_list(result: &Value) -> Result<Vec<ToolDefinition>, ToolExecutionError> {
    let tools = result
        .get("tools")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolExecutionError::Protocol("tools/list result has no tools array".to_string()))?;

    Ok(tools
        .iter()
        .filter_map(|tool| match normalize_tool(tool) {
            Ok(def) => Some(def),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed tool from backend");
                None
            }
        })
        .collect())
}

pub(crate) fn parse_call_result(result: &Value) -> ToolOutput {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let content = match result.get("content") {
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => result.to_string(),
    };

    ToolOutput { content, is_error }
}

#[async_trait]
impl ToolBackend for JsonRpcToolBackend {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolExecutionError> {
        let result = self.call("tools/list", json!({})).await?;
        let tools = parse_tool_list(&result)?;
        debug!(count = tools.len(), "Listed tools from backend");
        Ok(tools)
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<ToolOutput, ToolExecutionError> {
        let result = self
            .call("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        Ok(parse_call_result(&result))
    }

    fn describe(&self) -> String {
        format!("JSON-RPC backend at {}", self.endpoint)
    }
}

impl std::fmt::Debug for JsonRpcToolBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcToolBackend")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}});
        assert_eq!(unwrap_rpc(body).unwrap(), json!({"tools": []}));
    }

    #[test]
    fn test_unwrap_error() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "Method not found"}
        });
        let err = unwrap_rpc(body).unwrap_err();
        assert!(err.to_string().contains("Method not found"));
    }

    #[test]
    fn test_parse_tool_list_skips_malformed() {
        let result = json!({
            "tools": [
                {"name": "give_item", "description": "Give", "inputSchema": {"type": "object"}},
                {"description": "nameless"}
            ]
        });
        let tools = parse_tool_list(&result).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "give_item");
        assert_eq!(tools[0].input_schema["properties"], json!({}));
    }

    #[test]
    fn test_parse_call_result() {
        let output = parse_call_result(&json!({
            "content": [
                {"type": "text", "text": "Gave 16 bread"},
                {"type": "text", "text": "to Alex"}
            ]
        }));
        assert_eq!(output.content, "Gave 16 bread\nto Alex");
        assert!(!output.is_error);

        let failed = parse_call_result(&json!({
            "content": [{"type": "text", "text": "player offline"}],
            "isError": true
        }));
        assert!(failed.is_error);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let backend =
            JsonRpcToolBackend::new("http://localhost:59999/rpc", Duration::from_secs(2)).unwrap();
        let result = backend.list_tools().await;
        assert!(matches!(result, Err(ToolExecutionError::Transport(_))));
    }
}
