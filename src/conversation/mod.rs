//! Multi-turn, tool-using conversations.

pub mod driver;
pub mod events;
pub mod history;

pub use driver::{Conversation, ConversationOptions, DriverState, DEFAULT_MAX_EMPTY_TURNS, EMPTY_ANSWER_PLACEHOLDER};
pub use events::{ConversationEvent, ConversationEventSink};
pub use history::History;
