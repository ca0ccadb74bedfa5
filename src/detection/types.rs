use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

use crate::ai::BackendError;

/// Which stage produced a detection decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Pattern,
    AiContextual,
    Cached,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Pattern => "pattern",
            DetectionMethod::AiContextual => "ai_contextual",
            DetectionMethod::Cached => "cached",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the assistant should answer a message, and how sure it is
///
/// `confidence` is always within `[0.0, 1.0]`; every constructor and
/// deserialization clamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub should_respond: bool,
    #[serde(deserialize_with = "deserialize_confidence")]
    pub confidence: f32,
    pub reason: String,
    pub method: DetectionMethod,
}

impl DetectionResult {
    pub fn new(
        should_respond: bool,
        confidence: f32,
        reason: impl Into<String>,
        method: DetectionMethod,
    ) -> Self {
        Self {
            should_respond,
            confidence: clamp_confidence(confidence),
            reason: reason.into(),
            method,
        }
    }

    pub fn respond(confidence: f32, reason: impl Into<String>) -> Self {
        Self::new(true, confidence, reason, DetectionMethod::Pattern)
    }

    pub fn ignore(confidence: f32, reason: impl Into<String>) -> Self {
        Self::new(false, confidence, reason, DetectionMethod::Pattern)
    }

    pub fn with_method(mut self, method: DetectionMethod) -> Self {
        self.method = method;
        self
    }

    /// Positive decision at or above `threshold`
    pub fn accepted_at(&self, threshold: f32) -> bool {
        self.should_respond && self.confidence >= threshold
    }
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.2}, {}): {}",
            if self.should_respond { "respond" } else { "ignore" },
            self.confidence,
            self.method,
            self.reason
        )
    }
}

/// Clamps into `[0.0, 1.0]`; NaN becomes 0
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    f32::deserialize(deserializer).map(clamp_confidence)
}

/// Detection failures
///
/// Everything but `Pattern` comes from the AI-contextual stage, where the
/// engine falls back to the pattern result.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("no detection provider configured")]
    NoProvider,

    #[error("detection provider failed: {0}")]
    Provider(#[from] BackendError),

    #[error("detection timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("unparsable detection reply: {0}")]
    Unparsable(String),

    #[error("invalid detection pattern: {0}")]
    Pattern(#[from] regex::Error),
}
