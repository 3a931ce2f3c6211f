//! Streaming event types and stop reasons.

use serde::{Deserialize, Serialize};

use super::message::Role;
use super::usage::Usage;

/// Why the model stopped producing output for the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    /// Any other provider reason (`max_tokens`, `stop_sequence`, ...), kept verbatim.
    Other(String),
}

impl StopReason {
    /// Map a provider stop-reason string onto a `StopReason`.
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::EndTurn => "end_turn",
            Self::ToolUse => "tool_use",
            Self::Other(reason) => reason,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header carried by a `ContentBlockStart` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    Text,
    ToolUse { id: String, name: String },
}

/// Partial payload carried by a `ContentBlockDelta` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BlockDelta {
    /// A text fragment.
    Text(String),
    /// A raw fragment of the tool-use input JSON document.
    ToolUseInput(String),
}

/// An event emitted by a streaming model transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart { role: Role },
    ContentBlockStart { index: usize, start: BlockStart },
    ContentBlockDelta { index: usize, delta: BlockDelta },
    ContentBlockStop { index: usize },
    MessageStop { stop_reason: StopReason },
    Metadata { usage: Option<Usage> },
    /// A provider event this crate does not model.
    Unknown { kind: String },
}

impl StreamEvent {
    /// Short name of the event, used in logs and error messages.
    pub fn kind(&self) -> &str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageStop { .. } => "message_stop",
            Self::Metadata { .. } => "metadata",
            Self::Unknown { kind } => kind,
        }
    }

    pub fn text_delta(index: usize, text: impl Into<String>) -> Self {
        Self::ContentBlockDelta {
            index,
            delta: BlockDelta::Text(text.into()),
        }
    }

    pub fn tool_input_delta(index: usize, fragment: impl Into<String>) -> Self {
        Self::ContentBlockDelta {
            index,
            delta: BlockDelta::ToolUseInput(fragment.into()),
        }
    }

    pub fn tool_use_start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ContentBlockStart {
            index,
            start: BlockStart::ToolUse {
                id: id.into(),
                name: name.into(),
            },
        }
    }
}
