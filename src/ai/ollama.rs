//! Ollama provider
//!
//! Talks to a local or remote Ollama server through `POST /api/chat`. The
//! system prompt travels as the first message, tools use the function-wrapped
//! shape, and tool calls come back with object arguments and no ids.
//!
//! # Example
//!
//! ```no_run
//! use parley::ai::{OllamaProvider, Provider};
//! use parley::config::ProviderSettings;
//! use parley::converters::OllamaToolConverter;
//! use parley::llm::ChatMessage;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OllamaProvider::new(&ProviderSettings::default(), Arc::new(OllamaToolConverter))?;
//!
//! if provider.test_connection().await {
//!     let history = vec![ChatMessage::user("Hello!")];
//!     let reply = provider.chat(&history, "You are a friendly bot.").await?;
//!     println!("{}", reply.content);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::error::BackendError;
use super::http::{join_url, HttpTransport};
use super::provider::{
    send_with_tool_fallback, ModelParams, Provider, ProviderKind, ProviderOptions, SharedParams,
    ToolSupport,
};
use crate::config::ProviderSettings;
use crate::converters::ToolConverter;
use crate::llm::{AIResponse, ChatMessage, MessageRole, ToolDefinition};

pub struct OllamaProvider {
    endpoint: String,
    params: SharedParams,
    transport: HttpTransport,
    converter: Arc<dyn ToolConverter>,
    tool_support: ToolSupport,
}

impl OllamaProvider {
    pub fn new(
        settings: &ProviderSettings,
        converter: Arc<dyn ToolConverter>,
    ) -> Result<Self, BackendError> {
        let kind = ProviderKind::Ollama;
        Ok(Self {
            endpoint: settings.endpoint_for(kind),
            params: SharedParams::new(settings.model_params(kind)),
            transport: HttpTransport::new(
                kind.as_str(),
                settings.timeout(),
                settings.retry_policy(),
            )?,
            converter,
            tool_support: ToolSupport::new(true),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Builds the `/api/chat` request body
    pub fn build_request(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Value {
        let params = self.params.get();
        let mut body = json!({
            "model": params.model,
            "messages": build_messages(history, system_prompt),
            "stream": false,
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
            },
        });

        let converted = self.converter.convert_definitions(tools);
        if !converted.is_empty() {
            body["tools"] = Value::Array(converted);
        }
        body
    }
}

/// Maps the neutral history onto Ollama chat messages
pub(crate) fn build_messages(history: &[ChatMessage], system_prompt: &str) -> Vec<Value> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !system_prompt.trim().is_empty() {
        messages.push(json!({"role": "system", "content": system_prompt}));
    }

    for message in history {
        let mut entry = json!({
            "role": message.role.as_str(),
            "content": message.content,
        });

        if message.role == MessageRole::Assistant && message.has_tool_calls() {
            entry["tool_calls"] = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "function": {"name": call.name, "arguments": call.arguments}
                    })
                })
                .collect();
        }

        messages.push(entry);
    }

    messages
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<Value>,
}

/// Parses a `/api/chat` reply
pub(crate) fn parse_response(
    raw: Value,
    converter: &dyn ToolConverter,
    model: &str,
) -> Result<AIResponse, BackendError> {
    let raw_text = raw.to_string();
    let response: OllamaChatResponse =
        serde_json::from_value(raw).map_err(|e| BackendError::InvalidResponse {
            message: format!("Unexpected response shape: {}", e),
            raw_response: Some(raw_text.chars().take(500).collect()),
        })?;

    let message = response.message.ok_or_else(|| BackendError::InvalidResponse {
        message: "Response has no message".to_string(),
        raw_response: Some(raw_text.chars().take(500).collect()),
    })?;

    if !response.done {
        warn!("Ollama response indicates incomplete generation");
    }

    debug!(
        "Ollama stats: prompt_tokens={}, eval_tokens={}",
        response.prompt_eval_count.unwrap_or(0),
        response.eval_count.unwrap_or(0)
    );

    let tool_calls = message
        .tool_calls
        .iter()
        .filter_map(|native| converter.convert_tool_result(native))
        .collect();

    Ok(AIResponse::with_tool_calls(message.content, tool_calls, "ollama", model).ensure_content())
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat_with_tools(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<AIResponse, BackendError> {
        let url = join_url(&self.endpoint, "/api/chat");
        let model = self.model();

        debug!(
            model = %model,
            messages = history.len(),
            tools = tools.len(),
            "Sending Ollama chat request"
        );

        let raw = send_with_tool_fallback(&self.tool_support, self.name(), tools, |active| {
            let body = self.build_request(history, system_prompt, active);
            let url = &url;
            async move { self.transport.post_json(url, &[], &body).await }
        })
        .await?;

        let response = parse_response(raw, self.converter.as_ref(), &model)?;
        info!(
            model = %model,
            tool_calls = response.tool_calls.len(),
            "Ollama chat completed"
        );
        Ok(response)
    }

    async fn test_connection(&self) -> bool {
        self.transport
            .probe(&join_url(&self.endpoint, "/api/tags"), &[])
            .await
    }

    fn supports_native_tools(&self) -> bool {
        self.tool_support.is_enabled()
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> String {
        self.params.get().model
    }

    fn temperature(&self) -> f32 {
        self.params.get().temperature
    }

    fn configure(&self, options: &ProviderOptions) {
        self.params.apply(options);
    }

    fn shutdown(&self) {
        self.transport.shutdown();
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{} @ {}", self.model(), self.endpoint))
    }
}

impl fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ModelParams { model, .. } = self.params.get();
        f.debug_struct("OllamaProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &model)
            .field("transport", &self.transport)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::OllamaToolConverter;
    use crate::llm::ToolCall;

    fn provider() -> OllamaProvider {
        let settings = ProviderSettings {
            endpoint: Some("http://localhost:59999".to_string()),
            model: Some("qwen2.5".to_string()),
            timeout_secs: 2,
            max_retries: 0,
            ..ProviderSettings::default()
        };
        OllamaProvider::new(&settings, Arc::new(OllamaToolConverter)).unwrap()
    }

    #[test]
    fn test_system_prompt_is_first_message() {
        let messages = build_messages(&[ChatMessage::user("hi")], "Be brief.");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "Be brief.");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn test_assistant_tool_calls_are_replayed() {
        let call = ToolCall::new("call_1", "give_item", json!({"item": "bread"}));
        let history = vec![
            ChatMessage::user("give me bread"),
            ChatMessage::assistant_with_tools("", vec![call]),
            ChatMessage::tool_response("call_1", "bread given"),
        ];

        let messages = build_messages(&history, "");
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[1]["tool_calls"][0]["function"]["arguments"]["item"],
            "bread"
        );
        assert_eq!(messages[2]["role"], "tool");
    }

    #[test]
    fn test_request_includes_converted_tools() {
        let provider = provider();
        let tools = vec![ToolDefinition::new(
            "give_item",
            "Give an item",
            json!({"type": "object", "properties": {}}),
        )];

        let body = provider.build_request(&[ChatMessage::user("hi")], "sys", &tools);
        assert_eq!(body["model"], "qwen2.5");
        assert_eq!(body["stream"], false);
        assert_eq!(body["tools"][0]["function"]["name"], "give_item");

        let plain = provider.build_request(&[], "sys", &[]);
        assert!(plain.get("tools").is_none());
    }

    #[test]
    fn test_parse_text_response() {
        let raw = json!({
            "model": "qwen2.5",
            "message": {"role": "assistant", "content": "Hello there"},
            "done": true
        });
        let response = parse_response(raw, &OllamaToolConverter, "qwen2.5").unwrap();
        assert_eq!(response.content, "Hello there");
        assert!(response.successful);
        assert!(!response.has_tool_calls());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "give_item", "arguments": {"item": "bread"}}}]
            },
            "done": true
        });
        let response = parse_response(raw, &OllamaToolConverter, "qwen2.5").unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.content, "");
    }

    #[test]
    fn test_parse_missing_message_is_invalid() {
        let result = parse_response(json!({"done": true}), &OllamaToolConverter, "m");
        assert!(matches!(result, Err(BackendError::InvalidResponse { .. })));
    }

    #[test]
    fn test_configure_changes_model() {
        let provider = provider();
        provider.configure(&ProviderOptions {
            model: Some("llama3.2".to_string()),
            ..ProviderOptions::default()
        });
        assert_eq!(provider.model(), "llama3.2");
        assert_eq!(provider.build_request(&[], "", &[])["model"], "llama3.2");
    }

    #[tokio::test]
    async fn test_connection_to_unreachable_server() {
        assert!(!provider().test_connection().await);
    }

    #[tokio::test]
    async fn test_requests_fail_after_shutdown() {
        let provider = provider();
        provider.shutdown();
        let result = provider.chat(&[ChatMessage::user("hi")], "").await;
        assert!(matches!(
            result,
            Err(BackendError::ConfigurationError { .. })
        ));
    }
}
