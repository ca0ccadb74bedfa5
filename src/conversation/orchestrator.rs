//! Conversation orchestrator
//!
//! Runs one user turn as a bounded loop: send the history to the provider,
//! execute any tool calls it asks for, append the results and ask again,
//! until the provider answers in plain text or the tool-call cap is hit.
//! A turn with cap `n` issues at most `n + 1` provider requests.
//!
//! Provider failures end the turn with a fixed apology; tool failures are
//! written into the history as `tool` messages and the loop carries on.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::config::ConversationSettings;
use crate::ai::{BackendError, ErrorKind, Provider};
use crate::llm::{ChatMessage, MessageHistory, ToolCall, ToolDefinition};
use crate::tools::{ToolCatalog, ToolExecutionError, ToolOutput};

/// Reply used when the provider cannot produce an answer
pub const TECHNICAL_DIFFICULTIES_MESSAGE: &str =
    "Sorry, I'm having some technical difficulties right now. Please try again in a moment.";

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnStatus {
    /// The provider gave a plain-text answer
    Completed,
    /// The tool-call cap was reached; the reply is a summary
    ToolLimitReached,
    /// The provider call failed; the reply is the fixed apology
    ProviderFailed(ErrorKind),
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub status: TurnStatus,
    pub provider_requests: usize,
    /// Names of executed tool calls, in execution order
    pub tools_used: Vec<String>,
    pub error: Option<BackendError>,
    pub elapsed: Duration,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, TurnStatus::ProviderFailed(_))
    }
}

pub struct ConversationOrchestrator {
    provider: RwLock<Arc<dyn Provider>>,
    catalog: RwLock<Arc<ToolCatalog>>,
    settings: RwLock<ConversationSettings>,
    global_history: RwLock<Arc<MessageHistory>>,
    participant_histories: DashMap<String, Arc<MessageHistory>>,
}

impl ConversationOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        catalog: Arc<ToolCatalog>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            provider: RwLock::new(provider),
            catalog: RwLock::new(catalog),
            global_history: RwLock::new(Arc::new(MessageHistory::new(settings.max_history))),
            settings: RwLock::new(settings),
            participant_histories: DashMap::new(),
        }
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider.read().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn settings(&self) -> ConversationSettings {
        self.settings
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn catalog(&self) -> Arc<ToolCatalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(|p| p.into_inner()))
    }

    /// Points tool listing and invocation at a different catalog
    pub fn replace_catalog(&self, catalog: Arc<ToolCatalog>) {
        *self.catalog.write().unwrap_or_else(|p| p.into_inner()) = catalog;
    }

    /// History the participant's turns read and write
    pub fn history_for(&self, participant: &str) -> Arc<MessageHistory> {
        let settings = self.settings();
        if settings.per_participant_history {
            Arc::clone(
                self.participant_histories
                    .entry(participant.to_string())
                    .or_insert_with(|| Arc::new(MessageHistory::new(settings.max_history)))
                    .value(),
            )
        } else {
            Arc::clone(&self.global_history.read().unwrap_or_else(|p| p.into_inner()))
        }
    }

    /// Clears one participant's history, or every history when `None`
    pub fn clear_history(&self, participant: Option<&str>) {
        match participant {
            Some(name) => {
                if let Some(history) = self.participant_histories.get(name) {
                    history.clear();
                }
                if !self.settings().per_participant_history {
                    self.history_for(name).clear();
                }
            }
            None => {
                self.participant_histories.clear();
                self.global_history
                    .read()
                    .unwrap_or_else(|p| p.into_inner())
                    .clear();
            }
        }
    }

    /// Swaps in a new provider and settings; histories and the tool list
    /// are discarded
    pub fn reload(&self, provider: Arc<dyn Provider>, settings: ConversationSettings) {
        *self.global_history.write().unwrap_or_else(|p| p.into_inner()) =
            Arc::new(MessageHistory::new(settings.max_history));
        *self.settings.write().unwrap_or_else(|p| p.into_inner()) = settings;
        *self.provider.write().unwrap_or_else(|p| p.into_inner()) = provider;
        self.participant_histories.clear();
        self.catalog().invalidate();
        info!("Conversation orchestrator reloaded");
    }

    /// Runs a turn for `participant` with the configured tool-call cap
    pub async fn handle_turn(&self, participant: &str, message: &str) -> TurnOutcome {
        let cap = self.settings().max_tool_calls;
        self.handle_turn_with_cap(participant, message, cap).await
    }

    pub async fn handle_turn_with_cap(
        &self,
        participant: &str,
        message: &str,
        max_tool_calls: usize,
    ) -> TurnOutcome {
        let history = self.history_for(participant);
        self.run_turn(&history, message, max_tool_calls).await
    }

    /// Runs a turn against a throwaway history
    pub async fn run_isolated_turn(&self, message: &str, max_tool_calls: usize) -> TurnOutcome {
        let history = MessageHistory::new(self.settings().max_history);
        self.run_turn(&history, message, max_tool_calls).await
    }

    async fn run_turn(
        &self,
        history: &MessageHistory,
        message: &str,
        max_tool_calls: usize,
    ) -> TurnOutcome {
        let start = Instant::now();
        let provider = self.provider();
        let settings = self.settings();
        let catalog = self.catalog();

        // The turn runs on a working copy; the stored history only ever
        // receives whole turns, so eviction cannot split an exchange.
        let mut messages = history.snapshot();
        let turn_start = messages.len();
        messages.push(ChatMessage::user(message));

        let tools: Arc<Vec<ToolDefinition>> = if provider.supports_native_tools() {
            catalog.tools_or_empty().await
        } else {
            debug!(provider = provider.name(), "Provider has no native tool support");
            Arc::new(Vec::new())
        };

        let mut provider_requests = 0;
        let mut tools_used: Vec<String> = Vec::new();

        for iteration in 0..=max_tool_calls {
            debug!("Iteration {}/{}", iteration + 1, max_tool_calls + 1);

            provider_requests += 1;

            let response = match provider
                .chat_with_tools(&messages, &settings.system_prompt, &tools)
                .await
            {
                Ok(response) if response.successful => response,
                Ok(response) => {
                    let error = BackendError::InvalidResponse {
                        message: response
                            .error_message
                            .unwrap_or_else(|| "unsuccessful response".to_string()),
                        raw_response: None,
                    };
                    history.extend(messages.drain(turn_start..));
                    return self.failed(error, provider_requests, tools_used, start);
                }
                Err(error) => {
                    history.extend(messages.drain(turn_start..));
                    return self.failed(error, provider_requests, tools_used, start);
                }
            };

            if !response.has_tool_calls() {
                messages.push(ChatMessage::assistant(&response.content));
                history.extend(messages.drain(turn_start..));
                info!(
                    provider = provider.name(),
                    requests = provider_requests,
                    tool_calls = tools_used.len(),
                    "Turn completed"
                );
                return TurnOutcome {
                    reply: response.content,
                    status: TurnStatus::Completed,
                    provider_requests,
                    tools_used,
                    error: None,
                    elapsed: start.elapsed(),
                };
            }

            // No request follows the last round, so its calls are not run
            if iteration == max_tool_calls {
                debug!(
                    "Skipping {} tool call(s) requested past the limit",
                    response.tool_calls.len()
                );
                break;
            }

            debug!("LLM responded with {} tool calls", response.tool_calls.len());
            messages.push(ChatMessage::assistant_with_tools(
                &response.content,
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let result = execute_tool(&catalog, call, settings.tool_timeout).await;
                messages.push(ChatMessage::tool_response(&call.id, result));
                tools_used.push(call.name.clone());
            }
        }

        warn!(
            max_tool_calls,
            requests = provider_requests,
            "Tool-call limit reached, ending turn with a summary"
        );
        let reply = tool_limit_summary(&tools_used);
        messages.push(ChatMessage::assistant(&reply));
        history.extend(messages.drain(turn_start..));

        TurnOutcome {
            reply,
            status: TurnStatus::ToolLimitReached,
            provider_requests,
            tools_used,
            error: None,
            elapsed: start.elapsed(),
        }
    }

    fn failed(
        &self,
        error: BackendError,
        provider_requests: usize,
        tools_used: Vec<String>,
        start: Instant,
    ) -> TurnOutcome {
        error!(error = %error, requests = provider_requests, "Provider request failed");
        TurnOutcome {
            reply: TECHNICAL_DIFFICULTIES_MESSAGE.to_string(),
            status: TurnStatus::ProviderFailed(error.kind()),
            provider_requests,
            tools_used,
            error: Some(error),
            elapsed: start.elapsed(),
        }
    }
}

impl std::fmt::Debug for ConversationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationOrchestrator")
            .field("provider", &self.provider().name().to_string())
            .field("settings", &self.settings())
            .field("participants", &self.participant_histories.len())
            .finish()
    }
}

/// Executes one call and renders the text stored in the `tool` message
async fn execute_tool(catalog: &ToolCatalog, call: &ToolCall, timeout: Duration) -> String {
    debug!("Executing tool: {} with call_id: {}", call.name, call.id);

    match invoke_checked(catalog, call, timeout).await {
        Ok(output) if !output.is_error => output.content,
        Ok(output) => {
            warn!(tool = %call.name, "Tool reported an error: {}", output.content);
            format!("Error executing tool {}: {}", call.name, output.content)
        }
        Err(e) => {
            warn!("Tool execution failed, returning error to LLM: {}", e);
            format!("Error executing tool {}: {}", call.name, e)
        }
    }
}

async fn invoke_checked(
    catalog: &ToolCatalog,
    call: &ToolCall,
    timeout: Duration,
) -> Result<ToolOutput, ToolExecutionError> {
    let definition = catalog
        .find(&call.name)
        .await
        .ok_or_else(|| ToolExecutionError::UnknownTool(call.name.clone()))?;

    validate_arguments(&definition, &call.arguments)?;

    match tokio::time::timeout(timeout, catalog.invoke(&call.name, &call.arguments)).await {
        Ok(result) => result,
        Err(_) => Err(ToolExecutionError::Timeout {
            tool: call.name.clone(),
            millis: timeout.as_millis() as u64,
        }),
    }
}

/// Checks that arguments are an object carrying every required property
pub fn validate_arguments(
    definition: &ToolDefinition,
    arguments: &Value,
) -> Result<(), ToolExecutionError> {
    let object = arguments
        .as_object()
        .ok_or_else(|| ToolExecutionError::InvalidArguments {
            tool: definition.name.clone(),
            reason: "arguments must be a JSON object".to_string(),
        })?;

    let missing: Vec<&str> = definition
        .required_arguments()
        .into_iter()
        .filter(|key| !object.contains_key(*key))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ToolExecutionError::InvalidArguments {
            tool: definition.name.clone(),
            reason: format!("missing required argument(s): {}", missing.join(", ")),
        })
    }
}

/// Reply for a turn that ran out of tool-call rounds
pub fn tool_limit_summary(tools_used: &[String]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for name in tools_used {
        match counts.iter_mut().find(|(n, _)| *n == name.as_str()) {
            Some((_, count)) => *count += 1,
            None => counts.push((name.as_str(), 1)),
        }
    }

    if counts.is_empty() {
        return "I made several tool calls but couldn't finish. Could you ask me again?"
            .to_string();
    }

    let listed: Vec<String> = counts
        .into_iter()
        .map(|(name, count)| {
            if count == 1 {
                name.to_string()
            } else {
                format!("{} (x{})", name, count)
            }
        })
        .collect();

    format!(
        "I made several tool calls, here is a summary: I used {}. Let me know if you need anything else.",
        listed.join(", ")
    )
}
