//! Shared HTTP transport for the network providers
//!
//! Wraps a pooled `reqwest::Client`, maps transport failures and HTTP error
//! statuses onto [`BackendError`] and runs every POST under the provider's
//! [`RetryPolicy`]. Shutting the transport down drops the client; requests
//! made afterwards fail fast with a configuration error.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::error::BackendError;
use super::retry::RetryPolicy;

pub struct HttpTransport {
    provider: &'static str,
    client: RwLock<Option<Client>>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(
        provider: &'static str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            provider,
            client: RwLock::new(Some(client)),
            timeout,
            retry,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn client(&self) -> Result<Client, BackendError> {
        self.client
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| BackendError::ConfigurationError {
                message: "provider has been shut down".to_string(),
            })
    }

    pub fn shutdown(&self) {
        let previous = self
            .client
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if previous.is_some() {
            debug!(provider = self.provider, "HTTP transport shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// POSTs `body` as JSON and returns the decoded JSON reply, retrying
    /// recoverable failures
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> Result<Value, BackendError> {
        let label = format!("{} {}", self.provider, url);
        self.retry
            .execute(&label, || self.post_once(url, headers, body))
            .await
    }

    async fn post_once(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> Result<Value, BackendError> {
        let client = self.client()?;
        let mut request = client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            error!(
                provider = self.provider,
                status = status.as_u16(),
                "API returned error status: {}",
                text
            );
            return Err(BackendError::from_status(status.as_u16(), &text, retry_after));
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.map_request_error(e))?;

        debug!(
            provider = self.provider,
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = text.len(),
            "Received response"
        );

        serde_json::from_str(&text).map_err(|e| {
            error!(provider = self.provider, "Failed to parse response: {}", e);
            BackendError::InvalidResponse {
                message: format!("JSON parse error: {}", e),
                raw_response: Some(text.chars().take(500).collect()),
            }
        })
    }

    /// GETs `url` and reports whether it answered with a success status
    pub async fn probe(&self, url: &str, headers: &[(&'static str, String)]) -> bool {
        let Ok(client) = self.client() else {
            return false;
        };

        let mut request = client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(provider = self.provider, "Health check successful");
                true
            }
            Ok(response) => {
                warn!(
                    provider = self.provider,
                    "Health check failed with status: {}",
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!(provider = self.provider, "Health check error: {}", e);
                false
            }
        }
    }

    fn map_request_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            error!(
                provider = self.provider,
                "Request timed out after {:?}", self.timeout
            );
            BackendError::TimeoutError {
                seconds: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            error!(provider = self.provider, "Connection failed: {}", e);
            BackendError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else {
            error!(provider = self.provider, "Request error: {}", e);
            BackendError::NetworkError {
                message: format!("Request failed: {}", e),
            }
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("provider", &self.provider)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Joins a base endpoint and an API path without doubling slashes
pub fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
