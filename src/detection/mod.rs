//! Response detection
//!
//! Decides whether an inbound chat message warrants an answer. See
//! [`ResponseDetector`] for the decision pipeline.

pub mod cache;
pub mod context;
pub mod engine;
pub mod patterns;
pub mod prompt;
pub mod types;

pub use cache::{normalize_key, CacheStats, DecisionCache};
pub use context::{ContextEntry, ConversationContext, Speaker};
pub use engine::ResponseDetector;
pub use patterns::PatternMatcher;
pub use types::{clamp_confidence, DetectionError, DetectionMethod, DetectionResult};
