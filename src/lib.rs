//! palaver: tool-using conversations with Bedrock-hosted language models.
//!
//! A [`Conversation`](conversation::Conversation) sends the history to a
//! [`ModelTransport`](transport::ModelTransport), reassembles streamed turns,
//! dispatches the tools the model asks for through a
//! [`ToolRegistry`](tools::ToolRegistry), and loops until the model ends its
//! turn.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use palaver::prelude::*;
//! use palaver::tools::default_registry;
//! use palaver::transport::bedrock::BedrockTransport;
//!
//! # async fn example() -> palaver::error::Result<()> {
//! let config = PalaverConfig::from_env()?;
//! let transport = Arc::new(BedrockTransport::new(config.region.clone()).await);
//! let mut conversation = Conversation::new(
//!     transport,
//!     default_registry(&config)?,
//!     ConversationOptions::from_config(&config),
//! );
//! let answer = conversation.ask("What's weather in Beijing ?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod models;
pub mod prelude;
pub mod stream;
pub mod tools;
pub mod transport;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
