//! Tool registry
//!
//! In-process tool backend: a set of [`Tool`] implementations looked up by
//! name. Used when no remote tool endpoint is configured, and by tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::backend::{ToolBackend, ToolOutput};
use super::error::ToolExecutionError;
use super::trait_def::Tool;
use crate::llm::ToolDefinition;

/// Registry of in-process tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|existing| existing.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get all tools as ToolDefinition
    pub fn as_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Get all registered tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolBackend for ToolRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolExecutionError> {
        Ok(self.as_tool_definitions())
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<ToolOutput, ToolExecutionError> {
        let tool = self
            .get_tool(name)
            .ok_or_else(|| ToolExecutionError::UnknownTool(name.to_string()))?;

        info!(tool = name, "Executing tool");
        match tool.execute(arguments.clone()).await {
            Ok(output) => {
                let output = ToolOutput::from_value(&output);
                debug!(
                    tool = name,
                    output_preview = %output.content.chars().take(200).collect::<String>(),
                    "Tool output preview"
                );
                Ok(output)
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool execution failed");
                Err(ToolExecutionError::Failed {
                    tool: name.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    fn describe(&self) -> String {
        format!("in-process registry ({} tools)", self.len())
    }
}
