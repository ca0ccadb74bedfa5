use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::error::BackendError;
use super::provider::{ModelParams, Provider, ProviderOptions, SharedParams};
use crate::llm::{AIResponse, ChatMessage, ToolCall, ToolDefinition};

/// Scripted provider used by tests and the dry-run CLI mode
pub struct MockProvider {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    request_count: AtomicUsize,
    name: String,
    params: SharedParams,
    native_tools: AtomicBool,
    connected: AtomicBool,
    shut_down: AtomicBool,
    delay: RwLock<Option<Duration>>,
    fallback: RwLock<Option<MockResponse>>,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub error: Option<BackendError>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            error: None,
        }
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            error: None,
        }
    }

    /// Single tool call with a fixed id
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self::with_tool_calls("", vec![ToolCall::new(id, name, arguments)])
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            content: String::new(),
            tool_calls: Vec::new(),
            error: Some(error),
        }
    }
}

/// What the provider was asked, captured per request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub history: Vec<ChatMessage>,
    pub system_prompt: String,
    pub tools: Vec<ToolDefinition>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_name("mock")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            request_count: AtomicUsize::new(0),
            name: name.into(),
            params: SharedParams::new(ModelParams {
                model: "mock-model".to_string(),
                temperature: 0.0,
                max_tokens: 1024,
            }),
            native_tools: AtomicBool::new(true),
            connected: AtomicBool::new(true),
            shut_down: AtomicBool::new(false),
            delay: RwLock::new(None),
            fallback: RwLock::new(None),
        }
    }

    pub fn add_response(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        lock(&self.responses).extend(responses);
    }

    /// Response served whenever the script runs out
    pub fn set_fallback(&self, response: MockResponse) {
        *self.fallback.write().unwrap_or_else(|p| p.into_inner()) = Some(response);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write().unwrap_or_else(|p| p.into_inner()) = Some(delay);
    }

    pub fn set_native_tools(&self, enabled: bool) {
        self.native_tools.store(enabled, Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn remaining_responses(&self) -> usize {
        lock(&self.responses).len()
    }

    /// Number of chat requests received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<MockResponse, BackendError> {
        if let Some(response) = lock(&self.responses).pop_front() {
            return Ok(response);
        }
        self.fallback
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| BackendError::Other {
                message: "MockProvider: No more responses in queue".to_string(),
            })
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("name", &self.name)
            .field("requests", &self.request_count())
            .field("remaining", &self.remaining_responses())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Provider for MockProvider {
    async fn chat_with_tools(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<AIResponse, BackendError> {
        if self.is_shut_down() {
            return Err(BackendError::ConfigurationError {
                message: "provider has been shut down".to_string(),
            });
        }

        self.request_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(RecordedRequest {
            history: history.to_vec(),
            system_prompt: system_prompt.to_string(),
            tools: tools.to_vec(),
        });

        let delay = *self.delay.read().unwrap_or_else(|p| p.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.next_response()?;
        if let Some(error) = response.error {
            return Err(error);
        }

        Ok(AIResponse::with_tool_calls(
            response.content,
            response.tool_calls,
            self.name.clone(),
            self.model(),
        )
        .ensure_content())
    }

    async fn test_connection(&self) -> bool {
        !self.is_shut_down() && self.connected.load(Ordering::SeqCst)
    }

    fn supports_native_tools(&self) -> bool {
        self.native_tools.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
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
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let mock = MockProvider::new();
        mock.add_responses([
            MockResponse::tool_call("call_1", "give_item", json!({"item": "bread"})),
            MockResponse::text("Here's your bread!"),
        ]);

        let first = mock.chat(&[], "").await.unwrap();
        assert_eq!(first.tool_calls[0].name, "give_item");

        let second = mock.chat(&[], "").await.unwrap();
        assert_eq!(second.content, "Here's your bread!");
        assert_eq!(mock.request_count(), 2);
        assert_eq!(mock.remaining_responses(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors_without_fallback() {
        let mock = MockProvider::new();
        assert!(mock.chat(&[], "").await.is_err());

        mock.set_fallback(MockResponse::text("again"));
        assert_eq!(mock.chat(&[], "").await.unwrap().content, "again");
    }

    #[tokio::test]
    async fn test_records_requests() {
        let mock = MockProvider::new();
        mock.add_response(MockResponse::text("ok"));
        mock.chat(&[ChatMessage::user("hello")], "prompt")
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system_prompt, "prompt");
        assert_eq!(requests[0].history[0].content, "hello");
    }

    #[tokio::test]
    async fn test_shutdown() {
        let mock = MockProvider::new();
        mock.add_response(MockResponse::text("unused"));
        mock.shutdown();
        assert!(!mock.test_connection().await);
        assert!(matches!(
            mock.chat(&[], "").await,
            Err(BackendError::ConfigurationError { .. })
        ));
        assert_eq!(mock.request_count(), 0);
    }
}
