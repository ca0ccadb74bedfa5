//! LLM providers
//!
//! This module contains the [`Provider`] abstraction, its Ollama, OpenAI and
//! Anthropic implementations, the shared HTTP transport with retry, the error
//! taxonomy, and the [`ProviderFactory`] that caches provider instances.

pub mod anthropic;
pub mod error;
pub mod factory;
pub mod http;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod retry;

pub use anthropic::AnthropicProvider;
pub use error::{BackendError, ErrorKind};
pub use factory::ProviderFactory;
pub use mock::{MockProvider, MockResponse};
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use provider::{Provider, ProviderKind, ProviderOptions};
pub use retry::RetryPolicy;
