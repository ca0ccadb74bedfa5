//! parley - conversational engine for chat assistants
//!
//! Answers chat messages through one of several LLM providers, lets the
//! model call tools exposed by an external backend, and decides on its own
//! which messages deserve an answer.
//!
//! # Core Concepts
//!
//! - **Providers**: Ollama, OpenAI and Anthropic behind one [`Provider`]
//!   trait, with retries and a typed error taxonomy ([`BackendError`])
//! - **Tool converters**: translate neutral [`ToolDefinition`]s into each
//!   provider's wire format and tool calls back
//! - **Orchestrator**: runs a turn as a bounded loop of provider requests
//!   and tool executions
//! - **Response detection**: pattern rules, an optional AI classification
//!   stage, and a decision cache
//!
//! # Example Usage
//!
//! ```no_run
//! use parley::{ChatAssistant, ParleyConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ParleyConfig::load(None)?;
//! let assistant = ChatAssistant::from_config(config)?;
//!
//! let reply = assistant
//!     .handle_chat_line("alex", "How do I craft a sword?", false)
//!     .await;
//! if let Some(text) = reply.text() {
//!     println!("{}", text);
//! }
//! assistant.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod assistant;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod converters;
pub mod detection;
pub mod llm;
pub mod tools;
pub mod util;

pub use ai::{BackendError, ErrorKind, Provider, ProviderFactory, ProviderKind};
pub use assistant::{AssistantError, AssistantReply, ChatAssistant, SelfTestReport};
pub use config::{ConfigError, ParleyConfig};
pub use conversation::{ConversationOrchestrator, ConversationSettings, TurnOutcome, TurnStatus};
pub use converters::{ConverterFactory, ToolConverter};
pub use detection::{DetectionMethod, DetectionResult, ResponseDetector};
pub use llm::{AIResponse, ChatMessage, MessageHistory, MessageRole, ToolCall, ToolDefinition};
pub use tools::{Tool, ToolBackend, ToolCatalog, ToolExecutionError, ToolRegistry};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
