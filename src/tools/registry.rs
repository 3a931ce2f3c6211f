//! Name-keyed tool registry and dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::tool::Tool;
use super::types::ToolSpec;
use crate::error::PalaverError;
use crate::types::Message;

/// Ordered set of tools, looked up by name at dispatch time.
///
/// Names are unique: registering a second tool under an existing name fails.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), PalaverError> {
        let name = tool.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(PalaverError::DuplicateTool(name));
        }
        debug!(tool = %name, "registering tool");
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Builder-style [`ToolRegistry::register`].
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self, PalaverError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool specs in registration order, as sent to the model.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Dispatch a tool use whose input arrived as a raw JSON document.
    ///
    /// An empty document is read as `{}`.
    pub async fn dispatch(
        &self,
        tool_use_id: &str,
        tool_name: &str,
        arguments_json: &str,
    ) -> Result<Message, PalaverError> {
        let trimmed = arguments_json.trim();
        let arguments = if trimmed.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(trimmed)
                .map_err(|e| PalaverError::malformed_arguments(tool_name, e.to_string()))?
        };
        self.dispatch_value(tool_use_id, tool_name, arguments).await
    }

    /// Dispatch a tool use whose input is already parsed.
    pub async fn dispatch_value(
        &self,
        tool_use_id: &str,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<Message, PalaverError> {
        if !arguments.is_object() {
            return Err(PalaverError::malformed_arguments(
                tool_name,
                "arguments must be a JSON object",
            ));
        }
        let tool = self
            .get(tool_name)
            .ok_or_else(|| PalaverError::UnknownTool(tool_name.to_string()))?;

        info!(tool = tool_name, tool_use_id, "dispatching tool use");
        tool.invoke(tool_use_id, tool_name, arguments).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.iter().map(|t| t.name())).finish()
    }
}
