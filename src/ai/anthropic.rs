//! Anthropic Messages API provider
//!
//! The system prompt goes into the dedicated `system` field rather than the
//! message list. Message content is always sent as block arrays: assistant
//! tool calls become `tool_use` blocks and tool results become `tool_result`
//! blocks inside a user message. Consecutive messages with the same role are
//! merged, since the API requires user and assistant turns to alternate.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::error::BackendError;
use super::http::{join_url, HttpTransport};
use super::provider::{
    send_with_tool_fallback, Provider, ProviderKind, ProviderOptions, SharedParams, ToolSupport,
};
use crate::config::ProviderSettings;
use crate::converters::ToolConverter;
use crate::llm::{AIResponse, ChatMessage, MessageRole, ToolDefinition};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    endpoint: String,
    api_key: String,
    params: SharedParams,
    transport: HttpTransport,
    converter: Arc<dyn ToolConverter>,
    tool_support: ToolSupport,
}

impl AnthropicProvider {
    pub fn new(
        settings: &ProviderSettings,
        converter: Arc<dyn ToolConverter>,
    ) -> Result<Self, BackendError> {
        let kind = ProviderKind::Anthropic;
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| BackendError::ConfigurationError {
                message:
                    "Anthropic API key is not set (providers.anthropic.api_key or ANTHROPIC_API_KEY)"
                        .to_string(),
            })?;

        Ok(Self {
            endpoint: settings.endpoint_for(kind),
            api_key,
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

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("x-api-key", self.api_key.clone()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ]
    }

    pub fn build_request(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Value {
        let params = self.params.get();
        let (system, messages) = build_messages(history, system_prompt);

        let mut body = json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature.min(1.0),
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }

        let converted = self.converter.convert_definitions(tools);
        if !converted.is_empty() {
            body["tools"] = Value::Array(converted);
        }
        body
    }
}

/// Splits the history into the `system` text and the alternating message list
pub(crate) fn build_messages(history: &[ChatMessage], system_prompt: &str) -> (String, Vec<Value>) {
    let mut system_parts: Vec<&str> = Vec::new();
    if !system_prompt.trim().is_empty() {
        system_parts.push(system_prompt);
    }

    let mut messages: Vec<Value> = Vec::with_capacity(history.len());

    for message in history {
        let (role, blocks) = match message.role {
            MessageRole::System => {
                system_parts.push(&message.content);
                continue;
            }
            MessageRole::User => ("user", text_blocks(&message.content)),
            MessageRole::Assistant => {
                let mut blocks = text_blocks(&message.content);
                blocks.extend(message.tool_calls.iter().map(|call| {
                    let input = if call.arguments.is_object() {
                        call.arguments.clone()
                    } else {
                        json!({})
                    };
                    json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": input,
                    })
                }));
                ("assistant", blocks)
            }
            MessageRole::Tool => (
                "user",
                vec![json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.content,
                })],
            ),
        };

        if blocks.is_empty() {
            continue;
        }

        match messages.last_mut() {
            Some(last) if last["role"] == role => {
                if let Some(content) = last["content"].as_array_mut() {
                    content.extend(blocks);
                }
            }
            _ => messages.push(json!({"role": role, "content": blocks})),
        }
    }

    (system_parts.join("\n\n"), messages)
}

fn text_blocks(text: &str) -> Vec<Value> {
    if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![json!({"type": "text", "text": text})]
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

pub(crate) fn parse_response(
    raw: Value,
    converter: &dyn ToolConverter,
    model: &str,
) -> Result<AIResponse, BackendError> {
    let raw_text = raw.to_string();
    let response: MessagesResponse =
        serde_json::from_value(raw).map_err(|e| BackendError::InvalidResponse {
            message: format!("Unexpected response shape: {}", e),
            raw_response: Some(raw_text.chars().take(500).collect()),
        })?;

    if let Some(usage) = &response.usage {
        debug!(
            "Anthropic usage: input_tokens={}, output_tokens={}",
            usage.input_tokens, usage.output_tokens
        );
    }
    debug!(stop_reason = ?response.stop_reason, "Anthropic message received");

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in &response.content {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(part) = block.get("text").and_then(Value::as_str) {
                    text.push_str(part);
                }
            }
            Some("tool_use") => tool_calls.extend(converter.convert_tool_result(block)),
            _ => {}
        }
    }

    Ok(AIResponse::with_tool_calls(text, tool_calls, "anthropic", model).ensure_content())
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn chat_with_tools(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<AIResponse, BackendError> {
        let url = join_url(&self.endpoint, "/v1/messages");
        let headers = self.headers();
        let model = self.model();

        debug!(
            model = %model,
            messages = history.len(),
            tools = tools.len(),
            "Sending Anthropic messages request"
        );

        let raw = send_with_tool_fallback(&self.tool_support, self.name(), tools, |active| {
            let body = self.build_request(history, system_prompt, active);
            let (url, headers) = (&url, &headers);
            async move { self.transport.post_json(url, headers, &body).await }
        })
        .await?;

        let response = parse_response(raw, self.converter.as_ref(), &model)?;
        info!(
            model = %model,
            tool_calls = response.tool_calls.len(),
            "Anthropic chat completed"
        );
        Ok(response)
    }

    async fn test_connection(&self) -> bool {
        self.transport
            .probe(&join_url(&self.endpoint, "/v1/models"), &self.headers())
            .await
    }

    fn supports_native_tools(&self) -> bool {
        self.tool_support.is_enabled()
    }

    fn name(&self) -> &str {
        "anthropic"
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
}

impl fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model())
            .field("api_key", &"<redacted>")
            .finish()
    }
}
