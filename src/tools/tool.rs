//! Tool capability trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::arguments::ToolArguments;
use super::types::ToolSpec;
use super::validation::validate_arguments;
use crate::error::PalaverError;
use crate::types::{Message, ToolResultContent};

/// What a tool's side effect produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A JSON result, wrapped by [`Tool::wrap_result`].
    Value(serde_json::Value),
    /// The tool ran but could not produce a result; reported to the model as
    /// an error-flagged tool result rather than aborting the conversation.
    Error(String),
}

impl From<serde_json::Value> for ToolOutput {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

/// Capability implemented by every pluggable tool.
///
/// Implementors supply identity, schema and [`Tool::call`]; schema
/// description, result packaging and guarded invocation are provided.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for the accepted arguments.
    fn input_schema(&self) -> &serde_json::Value;

    /// Key the raw result is nested under inside the tool-result payload.
    fn result_key(&self) -> &str {
        self.name()
    }

    /// Perform the tool's side effect.
    async fn call(&self, args: &ToolArguments) -> Result<ToolOutput, PalaverError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description(), self.input_schema().clone())
    }

    /// Wrap a raw result into a user message carrying one tool-result block.
    fn wrap_result(&self, tool_use_id: &str, result: serde_json::Value) -> Message {
        let mut payload = serde_json::Map::new();
        payload.insert(self.result_key().to_string(), result);
        Message::tool_result(
            tool_use_id,
            vec![ToolResultContent::Json(serde_json::Value::Object(payload))],
            false,
        )
    }

    /// Check the dispatch target and arguments, run the tool, and package its result.
    async fn invoke(
        &self,
        tool_use_id: &str,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<Message, PalaverError> {
        if tool_name != self.name() {
            return Err(PalaverError::InvalidDispatch {
                tool: self.name().to_string(),
                requested: tool_name.to_string(),
            });
        }
        validate_arguments(&arguments, self.input_schema()).map_err(|message| {
            PalaverError::InvalidArguments {
                tool: self.name().to_string(),
                message,
            }
        })?;

        debug!(tool = self.name(), tool_use_id, "invoking tool");
        let args = ToolArguments::new(self.name(), arguments);
        match self.call(&args).await? {
            ToolOutput::Value(result) => Ok(self.wrap_result(tool_use_id, result)),
            ToolOutput::Error(reason) => Ok(Message::tool_result(
                tool_use_id,
                vec![ToolResultContent::Text(reason)],
                true,
            )),
        }
    }
}

type ToolHandler = dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<ToolOutput, PalaverError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for quick tool creation.
pub struct FnTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, PalaverError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &serde_json::Value {
        &self.input_schema
    }

    async fn call(&self, args: &ToolArguments) -> Result<ToolOutput, PalaverError> {
        (self.handler)(args.clone()).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
