//! Append-only conversation history.

use serde::{Deserialize, Serialize};

use crate::error::PalaverError;
use crate::types::{Message, Role};

/// Ordered log of the messages exchanged so far.
///
/// Only the owning [`Conversation`](super::Conversation) appends to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a history, e.g. to resume a conversation.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Pretty JSON dump of every message.
    pub fn to_json_pretty(&self) -> Result<String, PalaverError> {
        Ok(serde_json::to_string_pretty(&self.messages)?)
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append an assistant tool-use message and the user message answering it.
    pub(crate) fn commit_tool_turn(&mut self, assistant: Message, results: Message) {
        debug_assert_eq!(assistant.role, Role::Assistant);
        debug_assert_eq!(results.role, Role::User);
        self.messages.reserve(2);
        self.messages.push(assistant);
        self.messages.push(results);
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolResultContent;
    use serde_json::json;

    #[test]
    fn tool_turn_commits_both_messages_in_order() {
        let mut history = History::new();
        history.push(Message::user("What's weather in Beijing ?"));

        history.commit_tool_turn(
            Message::assistant("Looking up Beijing."),
            Message::tool_result("tu-1", vec![ToolResultContent::Json(json!({"location": {}}))], false),
        );

        let roles: Vec<Role> = history.into_iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(history.last().unwrap().tool_results()[0].tool_use_id, "tu-1");
    }

    #[test]
    fn serializes_as_plain_message_list() {
        let mut history = History::new();
        history.push(Message::user("hi"));

        let value: serde_json::Value = serde_json::from_str(&history.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value[0]["role"], "user");
        assert_eq!(value[0]["content"][0], json!({"type": "text", "text": "hi"}));
    }
}
