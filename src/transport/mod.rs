//! Model transport trait and implementations.

#[cfg(feature = "bedrock")]
pub mod bedrock;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::PalaverError;
use crate::tools::ToolSpec;
use crate::types::{Message, StopReason, StreamEvent, Usage};

/// A request for one model turn.
#[derive(Debug, Clone)]
pub struct ConverseRequest {
    pub model_id: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    /// Tools the model may call, in registration order.
    pub tools: Vec<ToolSpec>,
}

/// A complete (non-streamed) model turn.
#[derive(Debug, Clone)]
pub struct ConverseResponse {
    /// The assistant message, with any tool-use blocks already parsed.
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
}

/// Core trait implemented by model transports.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Transport name (e.g., "bedrock").
    fn name(&self) -> &str;

    /// Run one turn and return the materialized response.
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse, PalaverError>;

    /// Run one turn and return its events as they arrive.
    async fn converse_stream(
        &self,
        request: &ConverseRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent, PalaverError>>, PalaverError>;
}
