//! Provider construction and caching
//!
//! The factory keeps one provider instance per provider name, tagged with a
//! hash of the settings it was built from. Asking again with unchanged
//! settings returns the cached instance; changed settings build a fresh one
//! and shut the old one down.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use super::anthropic::AnthropicProvider;
use super::error::BackendError;
use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::provider::{Provider, ProviderKind};
use crate::config::ProviderSettings;
use crate::converters::ConverterFactory;

struct CachedProvider {
    config_hash: String,
    provider: Arc<dyn Provider>,
}

#[derive(Default)]
pub struct ProviderFactory {
    providers: DashMap<String, CachedProvider>,
    converters: ConverterFactory,
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn converters(&self) -> &ConverterFactory {
        &self.converters
    }

    /// Returns the cached provider for `kind`, rebuilding it if `settings`
    /// changed since it was created
    pub fn get(
        &self,
        kind: ProviderKind,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn Provider>, BackendError> {
        let hash = settings.config_hash();

        match self.providers.entry(kind.as_str().to_string()) {
            Entry::Occupied(entry) if entry.get().config_hash == hash => {
                Ok(Arc::clone(&entry.get().provider))
            }
            Entry::Occupied(mut entry) => {
                let provider = self.create(kind, settings)?;
                let previous = entry.insert(CachedProvider {
                    config_hash: hash,
                    provider: Arc::clone(&provider),
                });
                info!(provider = %kind, "Provider settings changed, rebuilt provider");
                previous.provider.shutdown();
                Ok(provider)
            }
            Entry::Vacant(entry) => {
                let provider = self.create(kind, settings)?;
                entry.insert(CachedProvider {
                    config_hash: hash,
                    provider: Arc::clone(&provider),
                });
                debug!(provider = %kind, "Created provider");
                Ok(provider)
            }
        }
    }

    /// Builds a new, uncached provider
    pub fn create(
        &self,
        kind: ProviderKind,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn Provider>, BackendError> {
        let converter =
            self.converters
                .get(kind.as_str())
                .ok_or_else(|| BackendError::ConfigurationError {
                    message: format!("No tool converter for provider '{}'", kind),
                })?;

        let provider: Arc<dyn Provider> = match kind {
            ProviderKind::Ollama => Arc::new(OllamaProvider::new(settings, converter)?),
            ProviderKind::OpenAI => Arc::new(OpenAIProvider::new(settings, converter)?),
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(settings, converter)?),
        };
        Ok(provider)
    }

    /// Installs a prebuilt provider under `name`, replacing any cached one
    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        let previous = self.providers.insert(
            name.into(),
            CachedProvider {
                config_hash: String::new(),
                provider,
            },
        );
        if let Some(previous) = previous {
            previous.provider.shutdown();
        }
    }

    pub fn cached(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .get(name)
            .map(|entry| Arc::clone(&entry.provider))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Shuts down and forgets every cached provider
    pub fn clear(&self) {
        let names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((_, cached)) = self.providers.remove(&name) {
                cached.provider.shutdown();
            }
        }
        debug!("Provider cache cleared");
    }
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("ProviderFactory")
            .field("providers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockProvider;

    fn ollama_settings(model: &str) -> ProviderSettings {
        ProviderSettings {
            endpoint: Some("http://localhost:59999".to_string()),
            model: Some(model.to_string()),
            ..ProviderSettings::default()
        }
    }

    #[test]
    fn test_same_settings_reuse_instance() {
        let factory = ProviderFactory::new();
        let a = factory.get(ProviderKind::Ollama, &ollama_settings("llama3")).unwrap();
        let b = factory.get(ProviderKind::Ollama, &ollama_settings("llama3")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_changed_settings_rebuild() {
        let factory = ProviderFactory::new();
        let a = factory.get(ProviderKind::Ollama, &ollama_settings("llama3")).unwrap();
        let b = factory.get(ProviderKind::Ollama, &ollama_settings("mistral")).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.model(), "mistral");
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_missing_key_is_not_cached() {
        let factory = ProviderFactory::new();
        let result = factory.get(ProviderKind::OpenAI, &ProviderSettings::default());
        assert!(matches!(
            result,
            Err(BackendError::ConfigurationError { .. })
        ));
        assert!(factory.is_empty());
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = ollama_settings("llama3").config_hash();
        assert_eq!(a, ollama_settings("llama3").config_hash());
        assert_ne!(a, ollama_settings("mistral").config_hash());
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_clear_shuts_providers_down() {
        let factory = ProviderFactory::new();
        let mock = Arc::new(MockProvider::new());
        factory.register("mock", mock.clone());
        assert!(factory.cached("mock").is_some());

        factory.clear();
        assert!(mock.is_shut_down());
        assert!(factory.is_empty());
    }
}
