//! Chat assistant facade
//!
//! [`ChatAssistant`] is what a chat frontend talks to: it wires the response
//! detector in front of the conversation orchestrator, owns the provider
//! factory, and exposes reload, shutdown and self-test entry points. Every
//! method takes `&self` and may be called from any task.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::{BackendError, Provider, ProviderFactory};
use crate::config::{ConfigError, ParleyConfig, ToolsConfig};
use crate::conversation::{ConversationOrchestrator, ConversationSettings, TurnOutcome};
use crate::detection::{CacheStats, DetectionError, DetectionResult, ResponseDetector};
use crate::tools::{
    JsonRpcToolBackend, ToolBackend, ToolCatalog, ToolExecutionError, ToolRegistry,
};

const SELF_TEST_MESSAGE: &str =
    "This is an automated self-test. Reply with one short sentence confirming you are working.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Provider setup failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Response detection setup failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Tool backend setup failed: {0}")]
    Tools(#[from] ToolExecutionError),
}

/// What happened to one inbound chat line
#[derive(Debug, Clone)]
pub enum AssistantReply {
    /// Detection decided not to answer
    Ignored(DetectionResult),
    /// A turn ran; `detection` is `None` when the line was forced through
    Answered {
        detection: Option<DetectionResult>,
        outcome: TurnOutcome,
    },
}

impl AssistantReply {
    pub fn text(&self) -> Option<&str> {
        match self {
            AssistantReply::Ignored(_) => None,
            AssistantReply::Answered { outcome, .. } => Some(&outcome.reply),
        }
    }

    pub fn detection(&self) -> Option<&DetectionResult> {
        match self {
            AssistantReply::Ignored(detection) => Some(detection),
            AssistantReply::Answered { detection, .. } => detection.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfTestReport {
    pub provider: String,
    pub model: String,
    pub provider_reachable: bool,
    /// Only checked when intelligent detection is on
    pub detection_provider: Option<String>,
    pub detection_reachable: Option<bool>,
    pub tools_available: usize,
    pub tools_error: Option<String>,
    pub turn_reply: String,
    pub turn_succeeded: bool,
    pub provider_requests: usize,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        self.provider_reachable
            && self.turn_succeeded
            && self.detection_reachable.unwrap_or(true)
    }
}

pub struct ChatAssistant {
    config: RwLock<ParleyConfig>,
    providers: ProviderFactory,
    orchestrator: ConversationOrchestrator,
    detector: ResponseDetector,
}

impl ChatAssistant {
    /// Builds providers and the tool backend from a validated configuration
    pub fn from_config(config: ParleyConfig) -> Result<Self, AssistantError> {
        config.validate()?;

        let providers = ProviderFactory::new();
        let provider = active_provider(&providers, &config)?;
        let detection_provider = detection_provider(&providers, &config)?;
        let catalog = build_catalog(&config.tools)?;

        info!(
            provider = provider.name(),
            model = %provider.model(),
            tools = %catalog.backend().describe(),
            "Chat assistant ready"
        );

        Self::assemble(config, providers, provider, detection_provider, catalog)
    }

    /// Uses `provider` for both conversation and detection, and `tools` as
    /// the tool backend
    pub fn with_provider(
        config: ParleyConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolBackend>,
    ) -> Result<Self, AssistantError> {
        let providers = ProviderFactory::new();
        providers.register(provider.name().to_string(), Arc::clone(&provider));
        let catalog = Arc::new(ToolCatalog::new(
            tools,
            Duration::from_secs(config.tools.list_ttl_secs),
        ));
        let detection_provider = config
            .detection
            .intelligent_detection
            .then(|| Arc::clone(&provider));

        Self::assemble(config, providers, provider, detection_provider, catalog)
    }

    fn assemble(
        config: ParleyConfig,
        providers: ProviderFactory,
        provider: Arc<dyn Provider>,
        detection_provider: Option<Arc<dyn Provider>>,
        catalog: Arc<ToolCatalog>,
    ) -> Result<Self, AssistantError> {
        let orchestrator = ConversationOrchestrator::new(
            provider,
            catalog,
            ConversationSettings::from_config(&config.conversation),
        );
        let detector = ResponseDetector::new(config.detection.clone(), detection_provider)?;

        Ok(Self {
            config: RwLock::new(config),
            providers,
            orchestrator,
            detector,
        })
    }

    pub fn config(&self) -> ParleyConfig {
        self.config
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn orchestrator(&self) -> &ConversationOrchestrator {
        &self.orchestrator
    }

    pub fn detector(&self) -> &ResponseDetector {
        &self.detector
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        self.orchestrator.provider()
    }

    pub fn detection_stats(&self) -> CacheStats {
        self.detector.cache_stats()
    }

    /// Detection decision only; no turn is run
    pub async fn detect(&self, sender: &str, text: &str) -> DetectionResult {
        self.detector.detect(sender, text).await
    }

    /// Handles one chat line from `sender`
    ///
    /// With `force` the line skips detection, as for an explicit command.
    pub async fn handle_chat_line(&self, sender: &str, text: &str, force: bool) -> AssistantReply {
        let text = text.trim();

        let detection = if force {
            self.detector.record_message(sender, text);
            None
        } else {
            let detection = self.detector.detect(sender, text).await;
            if !self.detector.should_accept(&detection) {
                debug!(sender, decision = %detection, "Not responding");
                return AssistantReply::Ignored(detection);
            }
            Some(detection)
        };

        let outcome = self.orchestrator.handle_turn(sender, text).await;
        self.detector.record_reply(sender, &outcome.reply);

        AssistantReply::Answered { detection, outcome }
    }

    /// Applies a new configuration
    ///
    /// Providers whose settings changed are rebuilt, histories, the detection
    /// cache and the tool listing are dropped. On error nothing changes.
    pub fn reload_configuration(&self, config: ParleyConfig) -> Result<(), AssistantError> {
        config.validate()?;

        let provider = active_provider(&self.providers, &config)?;
        let detection_provider = detection_provider(&self.providers, &config)?;
        let previous = self.config();
        let catalog = if previous.tools != config.tools {
            Some(build_catalog(&config.tools)?)
        } else {
            None
        };

        self.detector
            .reload(config.detection.clone(), detection_provider)?;
        if let Some(catalog) = catalog {
            self.orchestrator.replace_catalog(catalog);
        }
        self.orchestrator.reload(
            Arc::clone(&provider),
            ConversationSettings::from_config(&config.conversation),
        );

        info!(
            provider = provider.name(),
            model = %provider.model(),
            "Configuration reloaded"
        );
        *self.config.write().unwrap_or_else(|p| p.into_inner()) = config;
        Ok(())
    }

    /// Checks provider connectivity and runs one bounded turn in isolation
    pub async fn self_test(&self) -> SelfTestReport {
        let config = self.config();
        let provider = self.provider();

        let provider_reachable = provider.test_connection().await;
        if !provider_reachable {
            warn!(provider = provider.name(), "Provider is not reachable");
        }

        let (detection_provider, detection_reachable) = if config.detection.intelligent_detection
        {
            match detection_provider(&self.providers, &config) {
                Ok(Some(p)) => (Some(p.name().to_string()), Some(p.test_connection().await)),
                Ok(None) => (None, None),
                Err(e) => {
                    warn!(error = %e, "Detection provider unavailable");
                    (config.detection.detection_provider.clone(), Some(false))
                }
            }
        } else {
            (None, None)
        };

        let (tools_available, tools_error) = match self.orchestrator.catalog().tools().await {
            Ok(tools) => (tools.len(), None),
            Err(e) => (0, Some(e.to_string())),
        };

        let turn = self
            .orchestrator
            .run_isolated_turn(SELF_TEST_MESSAGE, config.conversation.self_test_max_tool_calls)
            .await;

        let report = SelfTestReport {
            provider: provider.name().to_string(),
            model: provider.model(),
            provider_reachable,
            detection_provider,
            detection_reachable,
            tools_available,
            tools_error,
            turn_succeeded: turn.is_success(),
            turn_reply: turn.reply,
            provider_requests: turn.provider_requests,
        };
        info!(passed = report.passed(), "Self-test finished");
        report
    }

    /// Releases provider connections and forgets all conversation state
    pub fn shutdown(&self) {
        self.providers.clear();
        self.orchestrator.clear_history(None);
        self.detector.clear_cache();
        self.detector.clear_context(None);
        info!("Chat assistant shut down");
    }
}

impl std::fmt::Debug for ChatAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAssistant")
            .field("providers", &self.providers)
            .field("orchestrator", &self.orchestrator)
            .field("detector", &self.detector)
            .finish()
    }
}

fn active_provider(
    providers: &ProviderFactory,
    config: &ParleyConfig,
) -> Result<Arc<dyn Provider>, AssistantError> {
    let kind = config.active_provider()?;
    Ok(providers.get(kind, config.settings_for(kind))?)
}

fn detection_provider(
    providers: &ProviderFactory,
    config: &ParleyConfig,
) -> Result<Option<Arc<dyn Provider>>, AssistantError> {
    if !config.detection.intelligent_detection {
        return Ok(None);
    }
    let kind = config.detection_provider()?;
    Ok(Some(providers.get(kind, config.settings_for(kind))?))
}

/// JSON-RPC backend when an endpoint is configured, otherwise no tools
pub fn build_catalog(tools: &ToolsConfig) -> Result<Arc<ToolCatalog>, AssistantError> {
    let backend: Arc<dyn ToolBackend> = match tools.endpoint.as_deref() {
        Some(endpoint) if !endpoint.trim().is_empty() => Arc::new(JsonRpcToolBackend::new(
            endpoint,
            Duration::from_secs(tools.timeout_secs),
        )?),
        _ => Arc::new(ToolRegistry::new()),
    };
    Ok(Arc::new(ToolCatalog::new(
        backend,
        Duration::from_secs(tools.list_ttl_secs),
    )))
}
