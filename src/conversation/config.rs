use std::time::Duration;

use crate::config::{ConversationConfig, DEFAULT_SYSTEM_PROMPT};
use crate::llm::DEFAULT_MAX_HISTORY;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSettings {
    pub system_prompt: String,
    pub max_history: usize,
    pub max_tool_calls: usize,
    pub tool_timeout: Duration,
    pub per_participant_history: bool,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_history: DEFAULT_MAX_HISTORY,
            max_tool_calls: 5,
            tool_timeout: Duration::from_secs(30),
            per_participant_history: true,
        }
    }
}

impl ConversationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            max_history: config.max_history,
            max_tool_calls: config.max_tool_calls,
            tool_timeout: Duration::from_secs(config.tool_timeout_secs),
            per_participant_history: config.per_participant_history,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn with_tool_timeout(mut self, tool_timeout: Duration) -> Self {
        self.tool_timeout = tool_timeout;
        self
    }

    pub fn with_per_participant_history(mut self, enabled: bool) -> Self {
        self.per_participant_history = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ConversationSettings::default();
        assert_eq!(settings.max_tool_calls, 5);
        assert_eq!(settings.max_history, DEFAULT_MAX_HISTORY);
        assert!(settings.per_participant_history);
    }

    #[test]
    fn test_builder_pattern() {
        let settings = ConversationSettings::new()
            .with_system_prompt("Be terse.")
            .with_max_history(6)
            .with_max_tool_calls(2)
            .with_tool_timeout(Duration::from_millis(250))
            .with_per_participant_history(false);

        assert_eq!(settings.system_prompt, "Be terse.");
        assert_eq!(settings.max_history, 6);
        assert_eq!(settings.max_tool_calls, 2);
        assert_eq!(settings.tool_timeout, Duration::from_millis(250));
        assert!(!settings.per_participant_history);
    }

    #[test]
    fn test_from_config() {
        let config = ConversationConfig {
            tool_timeout_secs: 7,
            max_tool_calls: 3,
            ..ConversationConfig::default()
        };
        let settings = ConversationSettings::from_config(&config);
        assert_eq!(settings.tool_timeout, Duration::from_secs(7));
        assert_eq!(settings.max_tool_calls, 3);
    }
}
