//! OpenAI chat-completions provider
//!
//! Works against api.openai.com and any server exposing the same
//! `/v1/chat/completions` contract. Tool-call arguments travel as
//! JSON-encoded strings in both directions.

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

pub struct OpenAIProvider {
    endpoint: String,
    api_key: String,
    params: SharedParams,
    transport: HttpTransport,
    converter: Arc<dyn ToolConverter>,
    tool_support: ToolSupport,
}

impl OpenAIProvider {
    pub fn new(
        settings: &ProviderSettings,
        converter: Arc<dyn ToolConverter>,
    ) -> Result<Self, BackendError> {
        let kind = ProviderKind::OpenAI;
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| BackendError::ConfigurationError {
                message: "OpenAI API key is not set (providers.openai.api_key or OPENAI_API_KEY)"
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

    fn api_url(&self, path: &str) -> String {
        // OPENAI_API_BASE values conventionally already end in /v1
        if self.endpoint.trim_end_matches('/').ends_with("/v1") {
            join_url(&self.endpoint, path)
        } else {
            join_url(&join_url(&self.endpoint, "v1"), path)
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![("authorization", format!("Bearer {}", self.api_key))]
    }

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
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let converted = self.converter.convert_definitions(tools);
        if !converted.is_empty() {
            body["tools"] = Value::Array(converted);
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

pub(crate) fn build_messages(history: &[ChatMessage], system_prompt: &str) -> Vec<Value> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !system_prompt.trim().is_empty() {
        messages.push(json!({"role": "system", "content": system_prompt}));
    }

    for message in history {
        let entry = match message.role {
            MessageRole::Assistant if message.has_tool_calls() => {
                let calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                let content = if message.content.is_empty() {
                    Value::Null
                } else {
                    json!(message.content)
                };
                json!({"role": "assistant", "content": content, "tool_calls": calls})
            }
            MessageRole::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content,
            }),
            role => json!({"role": role.as_str(), "content": message.content}),
        };
        messages.push(entry);
    }

    messages
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub(crate) fn parse_response(
    raw: Value,
    converter: &dyn ToolConverter,
    model: &str,
) -> Result<AIResponse, BackendError> {
    let raw_text = raw.to_string();
    let response: CompletionResponse =
        serde_json::from_value(raw).map_err(|e| BackendError::InvalidResponse {
            message: format!("Unexpected response shape: {}", e),
            raw_response: Some(raw_text.chars().take(500).collect()),
        })?;

    if let Some(usage) = &response.usage {
        debug!(
            "OpenAI usage: prompt_tokens={}, completion_tokens={}",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::InvalidResponse {
            message: "No choices in response".to_string(),
            raw_response: Some(raw_text.chars().take(500).collect()),
        })?;

    debug!(finish_reason = ?choice.finish_reason, "OpenAI choice received");

    let tool_calls = choice
        .message
        .tool_calls
        .iter()
        .filter_map(|native| converter.convert_tool_result(native))
        .collect();

    Ok(AIResponse::with_tool_calls(
        choice.message.content.unwrap_or_default(),
        tool_calls,
        "openai",
        model,
    )
    .ensure_content())
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn chat_with_tools(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<AIResponse, BackendError> {
        let url = self.api_url("chat/completions");
        let headers = self.headers();
        let model = self.model();

        debug!(
            model = %model,
            messages = history.len(),
            tools = tools.len(),
            "Sending OpenAI chat request"
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
            "OpenAI chat completed"
        );
        Ok(response)
    }

    async fn test_connection(&self) -> bool {
        self.transport
            .probe(&self.api_url("models"), &self.headers())
            .await
    }

    fn supports_native_tools(&self) -> bool {
        self.tool_support.is_enabled()
    }

    fn name(&self) -> &str {
        "openai"
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

impl fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model())
            .field("api_key", &"<redacted>")
            .finish()
    }
}
