//! Response detection engine
//!
//! Decides per inbound message whether the assistant should answer:
//!
//! 1. cached decision for an equivalent message, if caching is on
//! 2. pattern stage; final unless intelligent detection is on and the
//!    pattern confidence is below the high-confidence cutoff
//! 3. AI-contextual stage through the detection provider, bounded by a
//!    timeout; any failure falls back to the pattern result
//!
//! The final decision is cached. Acting on it is a separate step
//! ([`ResponseDetector::should_accept`]) using the configured threshold.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::cache::{CacheStats, DecisionCache};
use super::context::ConversationContext;
use super::patterns::PatternMatcher;
use super::prompt::{build_classification_prompt, parse_classification, DETECTION_SYSTEM_PROMPT};
use super::types::{DetectionError, DetectionMethod, DetectionResult};
use crate::ai::Provider;
use crate::config::DetectionConfig;
use crate::llm::ChatMessage;

struct DetectorState {
    config: DetectionConfig,
    matcher: PatternMatcher,
    provider: Option<Arc<dyn Provider>>,
    cache: DecisionCache,
}

impl DetectorState {
    fn build(
        config: DetectionConfig,
        provider: Option<Arc<dyn Provider>>,
    ) -> Result<Self, DetectionError> {
        let matcher = PatternMatcher::new(&config.agent_name, &config.trigger_prefixes)?;
        let cache = DecisionCache::new(
            Duration::from_secs(config.cache_ttl_secs),
            config.cache_max_entries,
        );
        Ok(Self {
            config,
            matcher,
            provider,
            cache,
        })
    }
}

pub struct ResponseDetector {
    state: RwLock<Arc<DetectorState>>,
    context: RwLock<Arc<ConversationContext>>,
}

impl ResponseDetector {
    /// `provider` is the detection provider; without one the AI stage is skipped
    pub fn new(
        config: DetectionConfig,
        provider: Option<Arc<dyn Provider>>,
    ) -> Result<Self, DetectionError> {
        let context = ConversationContext::new(config.context_size);
        Ok(Self {
            state: RwLock::new(Arc::new(DetectorState::build(config, provider)?)),
            context: RwLock::new(Arc::new(context)),
        })
    }

    pub fn config(&self) -> DetectionConfig {
        self.state().config.clone()
    }

    pub async fn detect(&self, participant: &str, message: &str) -> DetectionResult {
        let start = Instant::now();
        let state = self.state();
        let context = self.context();

        let result = self.decide(&state, &context, participant, message).await;
        context.record_message(participant, message);

        debug!(
            participant,
            decision = %result,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Detection finished"
        );
        result
    }

    async fn decide(
        &self,
        state: &DetectorState,
        context: &ConversationContext,
        participant: &str,
        message: &str,
    ) -> DetectionResult {
        let config = &state.config;

        if !config.enabled {
            return DetectionResult::respond(1.0, "response detection disabled");
        }

        if config.cache_enabled {
            if let Some(cached) = state.cache.get(message) {
                return cached;
            }
        }

        let pattern = state.matcher.classify(message);

        let result = if !config.intelligent_detection
            || pattern.confidence >= config.high_confidence_cutoff
        {
            pattern
        } else {
            match self.classify_with_ai(state, context, participant, message).await {
                Ok(ai) => ai,
                Err(e) => {
                    warn!(error = %e, "AI detection failed, using pattern result");
                    pattern
                }
            }
        };

        if config.cache_enabled {
            state.cache.insert(message, &result);
        }
        result
    }

    async fn classify_with_ai(
        &self,
        state: &DetectorState,
        context: &ConversationContext,
        participant: &str,
        message: &str,
    ) -> Result<DetectionResult, DetectionError> {
        let provider = state.provider.as_ref().ok_or(DetectionError::NoProvider)?;
        let prompt = build_classification_prompt(
            &state.config.agent_name,
            participant,
            &context.recent(participant),
            message,
        );
        let history = [ChatMessage::user(prompt)];

        let millis = state.config.timeout_ms;
        let response = tokio::time::timeout(
            Duration::from_millis(millis),
            provider.chat(&history, DETECTION_SYSTEM_PROMPT),
        )
        .await
        .map_err(|_| DetectionError::Timeout { millis })??;

        if !response.successful {
            return Err(DetectionError::Unparsable(
                response
                    .error_message
                    .unwrap_or_else(|| "unsuccessful response".to_string()),
            ));
        }

        let result = parse_classification(&response.content)?;
        debug!(provider = provider.name(), decision = %result, "AI detection");
        Ok(result)
    }

    /// Whether a decision is strong enough to act on
    pub fn should_accept(&self, result: &DetectionResult) -> bool {
        result.accepted_at(self.state().config.confidence_threshold)
    }

    /// Remembers a message that bypassed [`detect`](Self::detect)
    pub fn record_message(&self, participant: &str, message: &str) {
        self.context().record_message(participant, message);
    }

    pub fn record_reply(&self, participant: &str, reply: &str) {
        self.context().record_reply(participant, reply);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state().cache.stats()
    }

    pub fn clear_cache(&self) {
        self.state().cache.clear();
    }

    pub fn clear_context(&self, participant: Option<&str>) {
        self.context().clear(participant);
    }

    /// Applies new settings; the cache and the recorded context start empty
    pub fn reload(
        &self,
        config: DetectionConfig,
        provider: Option<Arc<dyn Provider>>,
    ) -> Result<(), DetectionError> {
        let context = ConversationContext::new(config.context_size);
        let state = DetectorState::build(config, provider)?;
        *self.state.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(state);
        *self.context.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(context);
        info!("Response detector reloaded");
        Ok(())
    }

    fn state(&self) -> Arc<DetectorState> {
        Arc::clone(&self.state.read().unwrap_or_else(|p| p.into_inner()))
    }

    fn context(&self) -> Arc<ConversationContext> {
        Arc::clone(&self.context.read().unwrap_or_else(|p| p.into_inner()))
    }
}

impl std::fmt::Debug for ResponseDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ResponseDetector")
            .field("config", &state.config)
            .field(
                "provider",
                &state.provider.as_ref().map(|p| p.name().to_string()),
            )
            .field("cache", &state.cache.stats())
            .finish()
    }
}
