//! Error types for palaver.

use thiserror::Error;

/// Primary error type for all palaver operations.
#[derive(Error, Debug)]
pub enum PalaverError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed stream: {0}")]
    MalformedStream(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid dispatch: {requested} routed to tool {tool}")]
    InvalidDispatch { tool: String, requested: String },

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Malformed arguments for {tool}: {message}")]
    MalformedToolArguments { tool: String, message: String },

    #[error("External service error in {tool}: {message}")]
    ExternalService { tool: String, message: String },

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Unexpected stop reason: {0}")]
    UnexpectedStop(String),

    #[error("Turn limit of {0} exceeded")]
    TurnLimitExceeded(usize),

    #[error("Conversation cancelled")]
    Cancelled,

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Broad error category, used when reporting a failed conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Stream,
    Dispatch,
    ExternalService,
    Conversation,
    Configuration,
    Serialization,
}

impl PalaverError {
    /// Build an `ExternalService` error for the given tool.
    pub fn external(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Build a `MalformedToolArguments` error for the given tool.
    pub fn malformed_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedToolArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) | Self::Network(_) | Self::Timeout(_) => ErrorCategory::Transport,
            Self::MalformedStream(_) => ErrorCategory::Stream,
            Self::UnknownTool(_)
            | Self::InvalidDispatch { .. }
            | Self::InvalidArguments { .. }
            | Self::MalformedToolArguments { .. } => ErrorCategory::Dispatch,
            Self::ExternalService { .. } => ErrorCategory::ExternalService,
            Self::UnexpectedStop(_) | Self::TurnLimitExceeded(_) | Self::Cancelled => {
                ErrorCategory::Conversation
            }
            Self::DuplicateTool(_) | Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
        }
    }

    /// Name of the tool involved, for dispatch-time and tool side-effect errors.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::UnknownTool(tool) | Self::DuplicateTool(tool) => Some(tool),
            Self::InvalidDispatch { tool, .. }
            | Self::InvalidArguments { tool, .. }
            | Self::MalformedToolArguments { tool, .. }
            | Self::ExternalService { tool, .. } => Some(tool),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PalaverError>;
