use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use super::backend::{ToolBackend, ToolOutput};
use super::error::ToolExecutionError;
use crate::llm::ToolDefinition;

struct Listing {
    fetched_at: Instant,
    tools: Arc<Vec<ToolDefinition>>,
}

/// Tool backend front that reuses tool listings for a bounded time
pub struct ToolCatalog {
    backend: Arc<dyn ToolBackend>,
    ttl: Duration,
    listing: RwLock<Option<Listing>>,
}

impl ToolCatalog {
    pub fn new(backend: Arc<dyn ToolBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            listing: RwLock::new(None),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ToolBackend> {
        &self.backend
    }

    /// Current tool list, fetched from the backend when the cached one expired
    pub async fn tools(&self) -> Result<Arc<Vec<ToolDefinition>>, ToolExecutionError> {
        if let Some(tools) = self.fresh() {
            debug!(count = tools.len(), "Tool list served from cache");
            return Ok(tools);
        }

        let tools = Arc::new(self.backend.list_tools().await?);
        *self.listing.write().unwrap_or_else(|p| p.into_inner()) = Some(Listing {
            fetched_at: Instant::now(),
            tools: Arc::clone(&tools),
        });
        debug!(count = tools.len(), backend = %self.backend.describe(), "Tool list refreshed");
        Ok(tools)
    }

    /// Like [`tools`](Self::tools), degrading to an empty list on failure
    pub async fn tools_or_empty(&self) -> Arc<Vec<ToolDefinition>> {
        match self.tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %e, "Could not list tools, continuing without tools");
                Arc::new(Vec::new())
            }
        }
    }

    pub async fn find(&self, name: &str) -> Option<ToolDefinition> {
        self.tools_or_empty()
            .await
            .iter()
            .find(|tool| tool.name == name)
            .cloned()
    }

    pub async fn invoke(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<ToolOutput, ToolExecutionError> {
        self.backend.invoke(name, arguments).await
    }

    pub fn invalidate(&self) {
        *self.listing.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    fn fresh(&self) -> Option<Arc<Vec<ToolDefinition>>> {
        let listing = self.listing.read().unwrap_or_else(|p| p.into_inner());
        listing
            .as_ref()
            .filter(|l| l.fetched_at.elapsed() < self.ttl)
            .map(|l| Arc::clone(&l.tools))
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("backend", &self.backend.describe())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        lists: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ToolBackend for CountingBackend {
        async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolExecutionError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ToolExecutionError::Transport("down".to_string()));
            }
            Ok(vec![ToolDefinition::new("ping", "", json!({"type": "object"}))])
        }

        async fn invoke(&self, _: &str, _: &Value) -> Result<ToolOutput, ToolExecutionError> {
            Ok(ToolOutput::text("pong"))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn backend(fail: bool) -> Arc<CountingBackend> {
        Arc::new(CountingBackend {
            lists: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_listing_is_reused_within_ttl() {
        let backend = backend(false);
        let catalog = ToolCatalog::new(backend.clone(), Duration::from_secs(60));

        catalog.tools().await.unwrap();
        catalog.tools().await.unwrap();
        assert!(catalog.find("ping").await.is_some());
        assert_eq!(backend.lists.load(Ordering::SeqCst), 1);

        catalog.invalidate();
        catalog.tools().await.unwrap();
        assert_eq!(backend.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_listing_is_refetched() {
        let backend = backend(false);
        let catalog = ToolCatalog::new(backend.clone(), Duration::ZERO);

        catalog.tools().await.unwrap();
        catalog.tools().await.unwrap();
        assert_eq!(backend.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_empty() {
        let catalog = ToolCatalog::new(backend(true), Duration::from_secs(60));
        assert!(catalog.tools().await.is_err());
        assert!(catalog.tools_or_empty().await.is_empty());
        assert!(catalog.find("ping").await.is_none());
    }
}
