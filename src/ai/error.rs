//! Provider error taxonomy
//!
//! `BackendError` is returned by every provider call. Its `kind()` places the
//! failure into one of the recoverable or non-recoverable classes the retry
//! policy and the orchestrator act on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing or invalid local settings; fatal, never retried
    Configuration,
    /// Network failure, timeout or server-side error; retried
    Transport,
    /// Rate limit hit; retried with backoff
    RateLimit,
    /// Authentication, authorization or not-found; aborts immediately
    NonRecoverableApi,
    /// Malformed or unexpected response shape
    Protocol,
}

/// Errors that can occur during provider operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendError {
    /// API request failed with the given message
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Authentication failed or credentials are invalid (401/403)
    AuthenticationError { message: String },

    /// Request timed out after the specified duration (in seconds)
    TimeoutError { seconds: u64 },

    /// Rate limit exceeded, retry after the specified duration (in seconds)
    RateLimitError { retry_after: Option<u64> },

    /// Invalid or malformed response from the LLM
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    /// Configuration error (missing API keys, invalid settings, etc.)
    ConfigurationError { message: String },

    /// Network-related error
    NetworkError { message: String },

    /// Generic error for other cases
    Other { message: String },
}

impl BackendError {
    /// Maps an HTTP error status and body onto the taxonomy
    pub fn from_status(status: u16, body: &str, retry_after: Option<u64>) -> Self {
        match status {
            401 | 403 => BackendError::AuthenticationError {
                message: format!("HTTP {}: {}", status, truncate(body, 300)),
            },
            429 => BackendError::RateLimitError { retry_after },
            _ => BackendError::ApiError {
                message: format!("HTTP {}: {}", status, truncate(body, 300)),
                status_code: Some(status),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::ConfigurationError { .. } => ErrorKind::Configuration,
            BackendError::AuthenticationError { .. } => ErrorKind::NonRecoverableApi,
            BackendError::RateLimitError { .. } => ErrorKind::RateLimit,
            BackendError::TimeoutError { .. } | BackendError::NetworkError { .. } => {
                ErrorKind::Transport
            }
            BackendError::ApiError { status_code, .. } => match status_code {
                None | Some(408) => ErrorKind::Transport,
                Some(code) if *code >= 500 => ErrorKind::Transport,
                Some(_) => ErrorKind::NonRecoverableApi,
            },
            BackendError::InvalidResponse { .. } => ErrorKind::Protocol,
            BackendError::Other { .. } => ErrorKind::Protocol,
        }
    }

    /// Whether another attempt could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::RateLimit)
    }

    /// Status code carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BackendError::ApiError { status_code, .. } => *status_code,
            BackendError::RateLimitError { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether the backend refused the request because it carried tools
    pub fn is_tool_rejection(&self) -> bool {
        match self {
            BackendError::ApiError {
                message,
                status_code: Some(400),
            } => {
                let lower = message.to_lowercase();
                lower.contains("tool") || lower.contains("function")
            }
            _ => false,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::AuthenticationError { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            BackendError::TimeoutError { seconds } => {
                write!(f, "Request timed out after {} seconds", seconds)
            }
            BackendError::RateLimitError { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limit exceeded, retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            BackendError::InvalidResponse { message, .. } => {
                write!(f, "Invalid response from LLM: {}", message)
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}
