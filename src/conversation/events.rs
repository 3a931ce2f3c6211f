//! Events emitted while a conversation runs.

use std::sync::Arc;

use serde::Serialize;

use super::driver::DriverState;
use crate::types::{Message, StopReason, Usage};

/// Something observable happened in the driver.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    StateChanged {
        state: DriverState,
    },
    /// A text fragment from the model, streamed or whole.
    TextDelta {
        text: String,
    },
    ToolUseRequested {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolCompleted {
        id: String,
        name: String,
        is_error: bool,
    },
    /// A message was appended to history.
    MessageCommitted {
        message: Message,
    },
    TurnCompleted {
        turn: usize,
        stop_reason: StopReason,
        usage: Option<Usage>,
    },
}

/// Callback receiving [`ConversationEvent`]s, invoked inline on the driver task.
pub type ConversationEventSink = Arc<dyn Fn(ConversationEvent) + Send + Sync>;
