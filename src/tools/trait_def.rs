use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::llm::ToolDefinition;

/// A tool implemented in-process
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;
    async fn execute(&self, arguments: Value) -> Result<Value>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.schema())
    }
}
