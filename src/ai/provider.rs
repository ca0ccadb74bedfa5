//! Provider abstraction
//!
//! Every LLM backend implements [`Provider`]. A provider takes the neutral
//! conversation history plus an optional tool list, talks its own wire format
//! and hands back an [`AIResponse`]. Providers are shared across concurrent
//! turns, so every method takes `&self` and mutable settings sit behind locks.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::error::BackendError;
use crate::llm::{AIResponse, ChatMessage, ToolDefinition};

/// Supported provider kinds
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server
    Ollama,
    /// OpenAI or any OpenAI-compatible endpoint
    #[value(name = "openai")]
    OpenAI,
    /// Anthropic Messages API
    Anthropic,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Ollama,
        ProviderKind::OpenAI,
        ProviderKind::Anthropic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Parses a provider name, accepting `claude` for Anthropic
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ollama" => Some(ProviderKind::Ollama),
            "openai" => Some(ProviderKind::OpenAI),
            "anthropic" | "claude" => Some(ProviderKind::Anthropic),
            _ => None,
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::OpenAI => "https://api.openai.com",
            ProviderKind::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "llama3.1",
            ProviderKind::OpenAI => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime overrides accepted by [`Provider::configure`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Model parameters a provider sends with every request
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelParams {
    pub fn apply(&mut self, options: &ProviderOptions) {
        if let Some(model) = options.model.as_ref().filter(|m| !m.trim().is_empty()) {
            self.model = model.clone();
        }
        if let Some(temperature) = options.temperature {
            self.temperature = temperature.clamp(0.0, 2.0);
        }
        if let Some(max_tokens) = options.max_tokens {
            self.max_tokens = max_tokens.max(1);
        }
    }
}

/// Lock around [`ModelParams`] that survives poisoning
#[derive(Debug)]
pub struct SharedParams(RwLock<ModelParams>);

impl SharedParams {
    pub fn new(params: ModelParams) -> Self {
        Self(RwLock::new(params))
    }

    pub fn get(&self) -> ModelParams {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn apply(&self, options: &ProviderOptions) {
        self.0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .apply(options);
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Plain chat completion without tools
    async fn chat(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
    ) -> Result<AIResponse, BackendError> {
        self.chat_with_tools(history, system_prompt, &[]).await
    }

    /// Chat completion that may answer with tool calls
    ///
    /// Each call counts as one provider request, whatever retries the
    /// transport performs underneath.
    async fn chat_with_tools(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<AIResponse, BackendError>;

    /// Cheap reachability check; never errors
    async fn test_connection(&self) -> bool;

    /// Whether tools are currently sent with requests
    fn supports_native_tools(&self) -> bool;

    fn name(&self) -> &str;

    fn model(&self) -> String;

    fn temperature(&self) -> f32;

    fn configure(&self, options: &ProviderOptions);

    /// Releases network resources; later requests fail with a configuration error
    fn shutdown(&self);

    fn model_info(&self) -> Option<String> {
        Some(format!("{} ({})", self.model(), self.name()))
    }
}

/// Sticky switch that turns native tool calling off after the backend
/// rejects a request because of its tools
#[derive(Debug)]
pub struct ToolSupport {
    native: bool,
    enabled: AtomicBool,
}

impl ToolSupport {
    pub fn new(native: bool) -> Self {
        Self {
            native,
            enabled: AtomicBool::new(native),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.native && self.enabled.load(Ordering::Acquire)
    }

    pub fn disable(&self, provider: &str, reason: &BackendError) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            warn!(
                provider,
                error = %reason,
                "Backend rejected tool definitions, continuing without native tools"
            );
        }
    }
}

/// Sends a request with tools attached, retrying once without them if the
/// backend refuses the tools
pub(crate) async fn send_with_tool_fallback<'a, F, Fut>(
    support: &ToolSupport,
    provider: &str,
    tools: &'a [ToolDefinition],
    mut send: F,
) -> Result<Value, BackendError>
where
    F: FnMut(&'a [ToolDefinition]) -> Fut,
    Fut: Future<Output = Result<Value, BackendError>>,
{
    if tools.is_empty() || !support.is_enabled() {
        return send(&[]).await;
    }

    match send(tools).await {
        Err(error) if error.is_tool_rejection() => {
            support.disable(provider, &error);
            send(&[]).await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_provider_kind_names() {
        assert_eq!(ProviderKind::from_name("Claude"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::from_name(" openai "), Some(ProviderKind::OpenAI));
        assert_eq!(ProviderKind::from_name("gemini"), None);
        assert_eq!(ProviderKind::OpenAI.to_string(), "openai");
        assert!(!ProviderKind::Ollama.requires_api_key());
    }

    #[test]
    fn test_provider_kind_value_enum_name() {
        let value = ProviderKind::OpenAI.to_possible_value().unwrap();
        assert_eq!(value.get_name(), "openai");
    }

    #[test]
    fn test_model_params_apply() {
        let mut params = ModelParams {
            model: "llama3".to_string(),
            temperature: 0.7,
            max_tokens: 512,
        };
        params.apply(&ProviderOptions {
            model: Some("mistral".to_string()),
            temperature: Some(5.0),
            max_tokens: None,
        });

        assert_eq!(params.model, "mistral");
        assert_eq!(params.temperature, 2.0);
        assert_eq!(params.max_tokens, 512);
    }

    #[tokio::test]
    async fn test_tool_rejection_falls_back_once() {
        let support = ToolSupport::new(true);
        let tools = vec![ToolDefinition::new("ping", "", json!({"type": "object"}))];
        let attempts = AtomicU32::new(0);

        let result = send_with_tool_fallback(&support, "ollama", &tools, |active| {
            attempts.fetch_add(1, Ordering::SeqCst);
            let with_tools = !active.is_empty();
            async move {
                if with_tools {
                    Err(BackendError::from_status(400, "model does not support tools", None))
                } else {
                    Ok(json!({"ok": true}))
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(!support.is_enabled());
    }

    #[tokio::test]
    async fn test_other_errors_do_not_disable_tools() {
        let support = ToolSupport::new(true);
        let tools = vec![ToolDefinition::new("ping", "", json!({"type": "object"}))];

        let result = send_with_tool_fallback(&support, "openai", &tools, |_| async {
            Err(BackendError::from_status(400, "prompt too long", None))
        })
        .await;

        assert!(result.is_err());
        assert!(support.is_enabled());
    }
}
