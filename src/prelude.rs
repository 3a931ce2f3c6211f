//! Convenience re-exports for common use.

pub use crate::config::PalaverConfig;
pub use crate::conversation::{Conversation, ConversationEvent, ConversationOptions, DriverState, History};
pub use crate::error::{PalaverError, Result};
pub use crate::tools::{FnTool, SchemaBuilder, Tool, ToolArguments, ToolOutput, ToolRegistry, ToolSpec};
pub use crate::transport::{ConverseRequest, ConverseResponse, ModelTransport};
pub use crate::types::{ContentBlock, Message, Role, StopReason, StreamEvent, ToolResultContent, Usage};
