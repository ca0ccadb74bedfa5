//! Configuration management for parley
//!
//! Settings are read from a YAML file and then overridden from the
//! environment. Every section has defaults, so an empty or missing file
//! yields a working local setup against Ollama.
//!
//! # File location
//!
//! `$PARLEY_CONFIG` if set, otherwise `<config_dir>/parley/config.yaml`
//! (for example `~/.config/parley/config.yaml` on Linux).
//!
//! # Environment Variables
//!
//! ## Parley
//! - `PARLEY_PROVIDER`: Active provider (ollama|openai|anthropic)
//! - `PARLEY_MODEL`: Model for the active provider
//! - `PARLEY_TOOL_ENDPOINT`: JSON-RPC tool backend URL
//! - `PARLEY_LOG_LEVEL`, `PARLEY_LOG_JSON`: see [`crate::util::logging`]
//!
//! ## Provider credentials and endpoints
//! - **Ollama**: `OLLAMA_HOST` (default: http://localhost:11434)
//! - **OpenAI**: `OPENAI_API_KEY` (required), `OPENAI_API_BASE` (optional)
//! - **Anthropic**: `ANTHROPIC_API_KEY` (required), `ANTHROPIC_BASE_URL` (optional)
//!
//! # Example
//!
//! ```no_run
//! use parley::ParleyConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ParleyConfig::load(None)?;
//! config.validate()?;
//! println!("{}", config);
//! # Ok(())
//! # }
//! ```

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ai::provider::{ModelParams, ProviderKind};
use crate::ai::{BackendError, RetryPolicy};
use crate::llm::DEFAULT_MAX_HISTORY;

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly assistant living in a game server chat. \
Keep answers short and conversational. When a player asks you to do something in the game, \
use the available tools instead of describing what you would do.";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid provider name
    #[error("Invalid provider: {0}. Valid options: ollama, openai, anthropic")]
    InvalidProvider(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    /// Configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backend initialization failed
    #[error("Backend initialization failed: {0}")]
    BackendInitError(#[from] BackendError),
}

/// Connection and model settings for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Base URL; the provider's public endpoint when unset
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Model name; the provider's default model when unset
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request HTTP timeout
    pub timeout_secs: u64,
    /// Retries after the first attempt for recoverable failures
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: crate::ai::retry::DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: crate::ai::retry::DEFAULT_BASE_DELAY_MS,
            retry_max_delay_ms: crate::ai::retry::DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl ProviderSettings {
    pub fn endpoint_for(&self, kind: ProviderKind) -> String {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(kind.default_endpoint())
            .to_string()
    }

    pub fn model_for(&self, kind: ProviderKind) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(kind.default_model())
            .to_string()
    }

    pub fn model_params(&self, kind: ProviderKind) -> ModelParams {
        ModelParams {
            model: self.model_for(kind),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    /// md5 of the canonical JSON form, used to detect changed settings
    pub fn config_hash(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        format!("{:x}", md5::compute(canonical.as_bytes()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ollama: ProviderSettings,
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Ollama => &self.ollama,
            ProviderKind::OpenAI => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::Ollama => &mut self.ollama,
            ProviderKind::OpenAI => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub system_prompt: String,
    pub max_history: usize,
    /// Tool-call rounds allowed per turn
    pub max_tool_calls: usize,
    /// Tool-call rounds allowed during the startup self-test
    pub self_test_max_tool_calls: usize,
    pub tool_timeout_secs: u64,
    /// Keep one history per participant instead of a single shared one
    pub per_participant_history: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_history: DEFAULT_MAX_HISTORY,
            max_tool_calls: 5,
            self_test_max_tool_calls: 2,
            tool_timeout_secs: 30,
            per_participant_history: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// When off, every message is answered
    pub enabled: bool,
    /// Consult a provider for ambiguous messages
    pub intelligent_detection: bool,
    pub agent_name: String,
    pub trigger_prefixes: Vec<String>,
    /// Provider used for classification; the active provider when unset
    pub detection_provider: Option<String>,
    pub timeout_ms: u64,
    /// Minimum final confidence for a positive decision to be acted on
    pub confidence_threshold: f32,
    /// Pattern confidence at or above which the AI stage is skipped
    pub high_confidence_cutoff: f32,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    /// Messages remembered per participant for classification prompts
    pub context_size: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intelligent_detection: false,
            agent_name: "Assistant".to_string(),
            trigger_prefixes: vec!["@ai".to_string(), "!ai".to_string()],
            detection_provider: None,
            timeout_ms: 3000,
            confidence_threshold: 0.6,
            high_confidence_cutoff: 0.8,
            cache_enabled: true,
            cache_ttl_secs: 300,
            cache_max_entries: 1000,
            context_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// JSON-RPC tool backend; no tools are offered when unset
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    /// How long a tool listing is reused
    pub list_ttl_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
            list_ttl_secs: 60,
        }
    }
}

/// Main configuration structure for parley
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    /// Active provider name
    pub provider: String,
    pub providers: ProvidersConfig,
    pub conversation: ConversationConfig,
    pub detection: DetectionConfig,
    pub tools: ToolsConfig,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama.as_str().to_string(),
            providers: ProvidersConfig::default(),
            conversation: ConversationConfig::default(),
            detection: DetectionConfig::default(),
            tools: ToolsConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ParleyConfig {
    /// `$PARLEY_CONFIG`, or `parley/config.yaml` under the user config dir
    pub fn default_path() -> Option<PathBuf> {
        env::var_os("PARLEY_CONFIG")
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("parley").join("config.yaml")))
    }

    /// Loads the configuration file and applies environment overrides
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| ConfigError::ParseError {
            field: "configuration file".to_string(),
            error: e.to_string(),
        })
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Applies overrides from `lookup`; empty values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("PARLEY_PROVIDER") {
            self.provider = provider.trim().to_lowercase();
        }
        if let Some(host) = get("OLLAMA_HOST") {
            self.providers.ollama.endpoint = Some(host);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(key);
        }
        if let Some(base) = get("OPENAI_API_BASE") {
            self.providers.openai.endpoint = Some(base);
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = Some(key);
        }
        if let Some(base) = get("ANTHROPIC_BASE_URL") {
            self.providers.anthropic.endpoint = Some(base);
        }
        if let Some(endpoint) = get("PARLEY_TOOL_ENDPOINT") {
            self.tools.endpoint = Some(endpoint);
        }
        if let Some(model) = get("PARLEY_MODEL") {
            if let Some(kind) = ProviderKind::from_name(&self.provider) {
                self.providers.get_mut(kind).model = Some(model);
            }
        }
        if let Some(level) = get("PARLEY_LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
    }

    pub fn active_provider(&self) -> Result<ProviderKind, ConfigError> {
        ProviderKind::from_name(&self.provider)
            .ok_or_else(|| ConfigError::InvalidProvider(self.provider.clone()))
    }

    /// Provider used by the detection AI stage
    pub fn detection_provider(&self) -> Result<ProviderKind, ConfigError> {
        match self.detection.detection_provider.as_deref() {
            Some(name) if !name.trim().is_empty() => ProviderKind::from_name(name)
                .ok_or_else(|| ConfigError::InvalidProvider(name.to_string())),
            _ => self.active_provider(),
        }
    }

    pub fn settings_for(&self, kind: ProviderKind) -> &ProviderSettings {
        self.providers.get(kind)
    }

    /// Validates the configuration
    ///
    /// Checks that:
    /// - The active and detection providers are known
    /// - Hosted providers in use have an API key
    /// - Numeric values are in valid ranges
    /// - Log level is valid
    pub fn validate(&self) -> Result<(), ConfigError> {
        let active = self.active_provider()?;
        let mut in_use = vec![active];
        if self.detection.intelligent_detection {
            let detection = self.detection_provider()?;
            if detection != active {
                in_use.push(detection);
            }
        }

        for kind in in_use {
            if kind.requires_api_key() && !self.providers.get(kind).has_api_key() {
                return Err(ConfigError::ValidationFailed(format!(
                    "Provider '{}' requires an API key",
                    kind
                )));
            }
        }

        for kind in ProviderKind::ALL {
            let settings = self.providers.get(kind);
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Temperature for '{}' must be between 0 and 2, got {}",
                    kind, settings.temperature
                )));
            }
            if settings.timeout_secs == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "Request timeout for '{}' must be at least 1 second",
                    kind
                )));
            }
            if settings.max_tokens == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "max_tokens for '{}' must be positive",
                    kind
                )));
            }
        }

        if self.conversation.max_history == 0 {
            return Err(ConfigError::ValidationFailed(
                "conversation.max_history must be at least 1".to_string(),
            ));
        }
        if self.conversation.tool_timeout_secs == 0 || self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Tool timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.detection.timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "detection.timeout_ms must be positive".to_string(),
            ));
        }

        for (name, value) in [
            ("confidence_threshold", self.detection.confidence_threshold),
            ("high_confidence_cutoff", self.detection.high_confidence_cutoff),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationFailed(format!(
                    "detection.{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }
}

impl fmt::Display for ParleyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parley Configuration:")?;
        writeln!(f, "  Provider: {}", self.provider)?;
        if let Some(kind) = ProviderKind::from_name(&self.provider) {
            let settings = self.providers.get(kind);
            writeln!(f, "  Endpoint: {}", settings.endpoint_for(kind))?;
            writeln!(f, "  Model: {}", settings.model_for(kind))?;
            writeln!(
                f,
                "  API Key: {}",
                if settings.has_api_key() { "set" } else { "not set" }
            )?;
        }
        writeln!(f, "  Max Tool Calls: {}", self.conversation.max_tool_calls)?;
        writeln!(
            f,
            "  Per-Participant History: {}",
            self.conversation.per_participant_history
        )?;
        writeln!(f, "  Detection Enabled: {}", self.detection.enabled)?;
        writeln!(
            f,
            "  Intelligent Detection: {}",
            self.detection.intelligent_detection
        )?;
        writeln!(
            f,
            "  Tool Endpoint: {}",
            self.tools.endpoint.as_deref().unwrap_or("none")
        )?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_configuration() {
        let config = ParleyConfig::default();
        assert_eq!(config.active_provider().unwrap(), ProviderKind::Ollama);
        assert_eq!(config.conversation.max_tool_calls, 5);
        assert_eq!(config.conversation.self_test_max_tool_calls, 2);
        assert!(!config.detection.intelligent_detection);
        assert_eq!(config.detection.high_confidence_cutoff, 0.8);
        assert_eq!(config.detection.confidence_threshold, 0.6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ParleyConfig::from_yaml_str(
            r#"
provider: anthropic
providers:
  anthropic:
    api_key: sk-ant-123
    model: claude-3-5-sonnet-latest
detection:
  intelligent_detection: true
  agent_name: Steve
"#,
        )
        .unwrap();

        assert_eq!(config.active_provider().unwrap(), ProviderKind::Anthropic);
        assert_eq!(
            config.providers.anthropic.model_for(ProviderKind::Anthropic),
            "claude-3-5-sonnet-latest"
        );
        assert_eq!(config.providers.anthropic.max_retries, 3);
        assert_eq!(config.detection.agent_name, "Steve");
        assert_eq!(config.detection.cache_ttl_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(
            ParleyConfig::from_yaml_str("  \n").unwrap(),
            ParleyConfig::default()
        );
    }

    #[test]
    fn test_malformed_yaml() {
        let result = ParleyConfig::from_yaml_str("provider: [unclosed");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_overrides() {
        let mut config = ParleyConfig::default();
        config.apply_overrides(lookup(&[
            ("PARLEY_PROVIDER", "OpenAI"),
            ("PARLEY_MODEL", "gpt-4o"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OLLAMA_HOST", "http://gpu-box:11434"),
            ("PARLEY_TOOL_ENDPOINT", "http://localhost:8765/rpc"),
            ("ANTHROPIC_API_KEY", ""),
        ]));

        assert_eq!(config.active_provider().unwrap(), ProviderKind::OpenAI);
        assert_eq!(config.providers.openai.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.providers.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(
            config.providers.ollama.endpoint.as_deref(),
            Some("http://gpu-box:11434")
        );
        assert_eq!(
            config.tools.endpoint.as_deref(),
            Some("http://localhost:8765/rpc")
        );
        assert!(config.providers.anthropic.api_key.is_none());
    }

    #[test]
    fn test_validation_rejects_unknown_provider() {
        let config = ParleyConfig {
            provider: "gemini".to_string(),
            ..ParleyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_validation_requires_api_key_for_hosted_provider() {
        let config = ParleyConfig {
            provider: "openai".to_string(),
            ..ParleyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_checks_detection_provider_only_when_used() {
        let mut config = ParleyConfig::default();
        config.detection.detection_provider = Some("anthropic".to_string());
        assert!(config.validate().is_ok());

        config.detection.intelligent_detection = true;
        assert!(config.validate().is_err());

        config.providers.anthropic.api_key = Some("sk-ant".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.detection_provider().unwrap(), ProviderKind::Anthropic);
    }

    #[test]
    fn test_validation_ranges() {
        let mut config = ParleyConfig::default();
        config.providers.ollama.temperature = 2.5;
        assert!(config.validate().is_err());

        let mut config = ParleyConfig::default();
        config.detection.confidence_threshold = 1.2;
        assert!(config.validate().is_err());

        let mut config = ParleyConfig::default();
        config.conversation.max_history = 0;
        assert!(config.validate().is_err());

        let mut config = ParleyConfig::default();
        config.providers.openai.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ParleyConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_settings_defaults() {
        let settings = ProviderSettings::default();
        assert_eq!(
            settings.endpoint_for(ProviderKind::Ollama),
            "http://localhost:11434"
        );
        assert_eq!(settings.model_for(ProviderKind::OpenAI), "gpt-4o-mini");
        assert_eq!(settings.retry_policy().max_retries, 3);
        assert!(!settings.has_api_key());
    }

    #[test]
    fn test_config_hash_tracks_changes() {
        let a = ProviderSettings::default();
        let mut b = a.clone();
        assert_eq!(a.config_hash(), b.config_hash());
        b.temperature = 0.2;
        assert_ne!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn test_config_display_hides_key() {
        let mut config = ParleyConfig::default();
        config.provider = "openai".to_string();
        config.providers.openai.api_key = Some("sk-secret".to_string());
        let display = config.to_string();
        assert!(display.contains("Parley Configuration:"));
        assert!(display.contains("API Key: set"));
        assert!(!display.contains("sk-secret"));
    }
}
