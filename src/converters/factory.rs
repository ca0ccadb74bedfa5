use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::{AnthropicToolConverter, OllamaToolConverter, OpenAIToolConverter, ToolConverter};

/// Hands out one shared converter per provider name
#[derive(Debug, Default)]
pub struct ConverterFactory {
    cache: DashMap<String, Arc<dyn ToolConverter>>,
}

impl ConverterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the converter for `provider`, or `None` for unknown names
    pub fn get(&self, provider: &str) -> Option<Arc<dyn ToolConverter>> {
        let key = provider.trim().to_lowercase();
        if let Some(existing) = self.cache.get(&key) {
            return Some(Arc::clone(existing.value()));
        }

        let converter: Arc<dyn ToolConverter> = match key.as_str() {
            "openai" => Arc::new(OpenAIToolConverter),
            "anthropic" | "claude" => Arc::new(AnthropicToolConverter),
            "ollama" => Arc::new(OllamaToolConverter),
            _ => return None,
        };

        debug!(provider = %key, "Created tool converter");
        Some(Arc::clone(
            self.cache.entry(key).or_insert(converter).value(),
        ))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
