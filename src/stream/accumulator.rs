//! Per-turn accumulation of stream events into a complete assistant turn.
//!
//! A [`TurnAccumulator`] is created for each streamed model call, fed every
//! event in arrival order, and consumed by [`TurnAccumulator::finish`]. Content
//! blocks are keyed by their stream index; fragments for one index never mix
//! with another's.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::PalaverError;
use crate::types::{
    BlockDelta, BlockStart, ContentBlock, Message, Role, StopReason, StreamEvent, ToolUse, Usage,
};

#[derive(Debug, Clone, PartialEq)]
enum BlockKind {
    Text,
    ToolUse { id: String, name: String },
}

impl BlockKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::ToolUse { .. } => "tool_use",
        }
    }
}

#[derive(Debug)]
struct BlockState {
    kind: BlockKind,
    buffer: String,
    frozen: bool,
    /// Parsed tool input, set when a tool-use block is frozen.
    input: Option<serde_json::Value>,
}

impl BlockState {
    fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            buffer: String::new(),
            frozen: false,
            input: None,
        }
    }

    fn freeze(&mut self, index: usize) -> Result<(), PalaverError> {
        if let BlockKind::ToolUse { name, .. } = &self.kind {
            let raw = self.buffer.trim();
            let input = if raw.is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(raw).map_err(|e| {
                    // EOF means fragments went missing; anything else is bad JSON from the model.
                    if e.is_eof() {
                        PalaverError::MalformedStream(format!(
                            "tool input for {name} at index {index} is not complete JSON: {e}"
                        ))
                    } else {
                        PalaverError::malformed_arguments(name.as_str(), e.to_string())
                    }
                })?
            };
            self.input = Some(input);
        }
        self.frozen = true;
        Ok(())
    }
}

/// A tool use reassembled from the stream, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolUse {
    pub index: usize,
    pub id: String,
    pub name: String,
    /// Input fragments concatenated in arrival order (`{}` when none arrived).
    pub input_json: String,
    pub input: serde_json::Value,
}

/// A complete model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutput {
    /// Every text fragment of the turn, in arrival order.
    pub text: String,
    /// Content blocks in index order.
    pub content: Vec<ContentBlock>,
    pub tool_uses: Vec<PendingToolUse>,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
}

impl TurnOutput {
    /// Normalize a materialized (non-streamed) assistant message.
    pub fn from_message(message: Message, stop_reason: StopReason, usage: Option<Usage>) -> Self {
        let text = message.text();
        let tool_uses = message
            .content
            .iter()
            .enumerate()
            .filter_map(|(index, block)| match block {
                ContentBlock::ToolUse(tool_use) => Some(PendingToolUse {
                    index,
                    id: tool_use.id.clone(),
                    name: tool_use.name.clone(),
                    input_json: tool_use.input.to_string(),
                    input: tool_use.input.clone(),
                }),
                _ => None,
            })
            .collect();
        Self {
            text,
            content: message.content,
            tool_uses,
            stop_reason,
            usage,
        }
    }

    /// The assistant message to record in history for this turn.
    pub fn to_message(&self) -> Message {
        Message::new(Role::Assistant, self.content.clone())
    }
}

/// Accumulates one streamed turn.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    blocks: BTreeMap<usize, BlockState>,
    text: String,
    started: bool,
    stop_reason: Option<StopReason>,
    usage: Option<Usage>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `MessageStop` has been seen.
    pub fn is_complete(&self) -> bool {
        self.stop_reason.is_some()
    }

    /// Feed the next stream event.
    pub fn apply(&mut self, event: StreamEvent) -> Result<(), PalaverError> {
        if self.is_complete() && !matches!(event, StreamEvent::Metadata { .. } | StreamEvent::Unknown { .. }) {
            return Err(PalaverError::MalformedStream(format!(
                "{} received after message_stop",
                event.kind()
            )));
        }

        match event {
            StreamEvent::MessageStart { role } => {
                if self.started || !self.blocks.is_empty() {
                    return Err(PalaverError::MalformedStream(
                        "message_start received mid-message".into(),
                    ));
                }
                debug!(?role, "message start");
                self.started = true;
            }
            StreamEvent::ContentBlockStart { index, start } => {
                if self.blocks.contains_key(&index) {
                    return Err(PalaverError::MalformedStream(format!(
                        "content block {index} started twice"
                    )));
                }
                let kind = match start {
                    BlockStart::Text => BlockKind::Text,
                    BlockStart::ToolUse { id, name } => {
                        debug!(index, %id, %name, "tool use block start");
                        BlockKind::ToolUse { id, name }
                    }
                };
                self.blocks.insert(index, BlockState::new(kind));
            }
            StreamEvent::ContentBlockDelta { index, delta } => self.apply_delta(index, delta)?,
            StreamEvent::ContentBlockStop { index } => match self.blocks.get_mut(&index) {
                Some(block) if block.frozen => {
                    return Err(PalaverError::MalformedStream(format!(
                        "content block {index} stopped twice"
                    )));
                }
                Some(block) => block.freeze(index)?,
                None => debug!(index, "ignoring stop for unknown content block"),
            },
            StreamEvent::MessageStop { stop_reason } => {
                for (index, block) in self.blocks.iter_mut() {
                    if !block.frozen {
                        block.freeze(*index)?;
                    }
                }
                debug!(%stop_reason, "message stop");
                self.stop_reason = Some(stop_reason);
            }
            StreamEvent::Metadata { usage } => {
                if let Some(usage) = usage {
                    self.usage.get_or_insert_with(Usage::default).merge(&usage);
                }
            }
            StreamEvent::Unknown { kind } => {
                warn!(%kind, "skipping unknown stream event");
            }
        }
        Ok(())
    }

    fn apply_delta(&mut self, index: usize, delta: BlockDelta) -> Result<(), PalaverError> {
        let (expected, fragment) = match &delta {
            BlockDelta::Text(text) => ("text", text),
            BlockDelta::ToolUseInput(fragment) => ("tool_use", fragment),
        };

        // Bedrock never sends a start event for text blocks.
        if expected != "text" && !self.blocks.contains_key(&index) {
            return Err(PalaverError::MalformedStream(format!(
                "tool input delta for unopened content block {index}"
            )));
        }
        let block = self
            .blocks
            .entry(index)
            .or_insert_with(|| BlockState::new(BlockKind::Text));

        if block.frozen {
            return Err(PalaverError::MalformedStream(format!(
                "delta for content block {index} after it stopped"
            )));
        }
        if block.kind.label() != expected {
            return Err(PalaverError::MalformedStream(format!(
                "{expected} delta for {} content block {index}",
                block.kind.label()
            )));
        }

        block.buffer.push_str(fragment);
        if expected == "text" {
            self.text.push_str(fragment);
        }
        Ok(())
    }

    /// Consume the accumulator and produce the completed turn.
    pub fn finish(self) -> Result<TurnOutput, PalaverError> {
        let Some(stop_reason) = self.stop_reason else {
            return Err(PalaverError::MalformedStream(
                "stream ended before message_stop".into(),
            ));
        };

        let mut content = Vec::with_capacity(self.blocks.len());
        let mut tool_uses = Vec::new();
        for (index, block) in self.blocks {
            match block.kind {
                BlockKind::Text => {
                    if !block.buffer.is_empty() {
                        content.push(ContentBlock::text(block.buffer));
                    }
                }
                BlockKind::ToolUse { id, name } => {
                    let input = block
                        .input
                        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
                    let input_json = match block.buffer.trim() {
                        "" => "{}".to_string(),
                        raw => raw.to_string(),
                    };
                    content.push(ContentBlock::ToolUse(ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    }));
                    tool_uses.push(PendingToolUse {
                        index,
                        id,
                        name,
                        input_json,
                        input,
                    });
                }
            }
        }

        Ok(TurnOutput {
            text: self.text,
            content,
            tool_uses,
            stop_reason,
            usage: self.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn feed(events: Vec<StreamEvent>) -> Result<TurnAccumulator, PalaverError> {
        let mut acc = TurnAccumulator::new();
        for event in events {
            acc.apply(event)?;
        }
        Ok(acc)
    }

    fn stop(reason: StopReason) -> StreamEvent {
        StreamEvent::MessageStop { stop_reason: reason }
    }

    #[test]
    fn tool_input_fragments_concatenate_in_order() {
        let acc = feed(vec![
            StreamEvent::MessageStart { role: Role::Assistant },
            StreamEvent::tool_use_start(0, "tu-1", "get_weather"),
            StreamEvent::tool_input_delta(0, r#"{"lat"#),
            StreamEvent::tool_input_delta(0, r#"itude":"39.9"#),
            StreamEvent::tool_input_delta(0, r#"042"}"#),
            StreamEvent::ContentBlockStop { index: 0 },
            stop(StopReason::ToolUse),
        ])
        .unwrap();

        let turn = acc.finish().unwrap();
        assert_eq!(turn.tool_uses.len(), 1);
        assert_eq!(turn.tool_uses[0].input_json, r#"{"latitude":"39.9042"}"#);
        assert_eq!(turn.tool_uses[0].input, json!({ "latitude": "39.9042" }));
        assert_eq!(turn.text, "");
    }

    #[test]
    fn interleaved_indices_stay_separate() {
        let acc = feed(vec![
            StreamEvent::text_delta(0, "Let me "),
            StreamEvent::tool_use_start(1, "tu-1", "get_lat_long"),
            StreamEvent::tool_input_delta(1, r#"{"pla"#),
            StreamEvent::text_delta(0, "check."),
            StreamEvent::tool_input_delta(1, r#"ce":"Beijing"}"#),
            stop(StopReason::ToolUse),
        ])
        .unwrap();

        let turn = acc.finish().unwrap();
        assert_eq!(turn.text, "Let me check.");
        assert_eq!(
            turn.content,
            vec![
                ContentBlock::text("Let me check."),
                ContentBlock::ToolUse(ToolUse {
                    id: "tu-1".into(),
                    name: "get_lat_long".into(),
                    input: json!({ "place": "Beijing" }),
                }),
            ]
        );
    }

    #[test]
    fn end_turn_text_is_arrival_order_concatenation() {
        let acc = feed(vec![
            StreamEvent::MessageStart { role: Role::Assistant },
            StreamEvent::text_delta(0, "It is "),
            StreamEvent::text_delta(0, "sunny "),
            StreamEvent::text_delta(0, "in Beijing."),
            StreamEvent::ContentBlockStop { index: 0 },
            stop(StopReason::EndTurn),
            StreamEvent::Metadata {
                usage: Some(Usage {
                    input_tokens: 10,
                    output_tokens: 5,
                    total_tokens: 15,
                }),
            },
        ])
        .unwrap();

        let turn = acc.finish().unwrap();
        assert_eq!(turn.text, "It is sunny in Beijing.");
        assert_eq!(turn.stop_reason, StopReason::EndTurn);
        assert_eq!(turn.usage.map(|u| u.total_tokens), Some(15));
    }

    #[test]
    fn empty_tool_input_reads_as_empty_object() {
        let acc = feed(vec![
            StreamEvent::tool_use_start(0, "tu-1", "get_lat_long"),
            StreamEvent::ContentBlockStop { index: 0 },
            stop(StopReason::ToolUse),
        ])
        .unwrap();

        let turn = acc.finish().unwrap();
        assert_eq!(turn.tool_uses[0].input_json, "{}");
        assert_eq!(turn.tool_uses[0].input, json!({}));
    }

    #[test]
    fn truncated_tool_input_is_malformed_at_stop() {
        let mut acc = TurnAccumulator::new();
        acc.apply(StreamEvent::tool_use_start(0, "tu-1", "get_weather")).unwrap();
        acc.apply(StreamEvent::tool_input_delta(0, r#"{"latitude":"39"#)).unwrap();

        let err = acc.apply(StreamEvent::ContentBlockStop { index: 0 }).unwrap_err();
        assert!(matches!(err, PalaverError::MalformedStream(_)));
    }

    #[test]
    fn complete_but_invalid_tool_input_is_malformed_arguments() {
        let mut acc = TurnAccumulator::new();
        acc.apply(StreamEvent::tool_use_start(0, "tu-1", "get_lat_long")).unwrap();
        acc.apply(StreamEvent::tool_input_delta(0, r#"{"place":"#)).unwrap();
        acc.apply(StreamEvent::tool_input_delta(0, "}")).unwrap();

        let err = acc.apply(StreamEvent::ContentBlockStop { index: 0 }).unwrap_err();
        assert!(
            matches!(err, PalaverError::MalformedToolArguments { ref tool, .. } if tool == "get_lat_long"),
            "{err:?}"
        );
    }

    #[test]
    fn message_stop_validates_unstopped_tool_blocks() {
        let mut acc = TurnAccumulator::new();
        acc.apply(StreamEvent::tool_use_start(0, "tu-1", "get_weather")).unwrap();
        acc.apply(StreamEvent::tool_input_delta(0, r#"{"latitude""#)).unwrap();

        let err = acc.apply(stop(StopReason::ToolUse)).unwrap_err();
        assert!(matches!(err, PalaverError::MalformedStream(_)));
    }

    #[test]
    fn protocol_violations_are_malformed() {
        let cases: Vec<Vec<StreamEvent>> = vec![
            vec![StreamEvent::tool_input_delta(3, "{}")],
            vec![
                StreamEvent::tool_use_start(0, "tu-1", "get_weather"),
                StreamEvent::tool_use_start(0, "tu-2", "get_weather"),
            ],
            vec![
                StreamEvent::tool_use_start(0, "tu-1", "get_weather"),
                StreamEvent::text_delta(0, "oops"),
            ],
            vec![
                StreamEvent::text_delta(0, "done"),
                StreamEvent::ContentBlockStop { index: 0 },
                StreamEvent::text_delta(0, " more"),
            ],
            vec![
                StreamEvent::text_delta(0, "done"),
                StreamEvent::ContentBlockStop { index: 0 },
                StreamEvent::ContentBlockStop { index: 0 },
            ],
            vec![stop(StopReason::EndTurn), StreamEvent::text_delta(0, "late")],
            vec![
                StreamEvent::MessageStart { role: Role::Assistant },
                StreamEvent::MessageStart { role: Role::Assistant },
            ],
        ];

        for events in cases {
            let description = format!("{events:?}");
            let err = feed(events).unwrap_err();
            assert!(matches!(err, PalaverError::MalformedStream(_)), "{description}");
        }
    }

    #[test]
    fn stop_for_unknown_index_and_unknown_events_are_skipped() {
        let acc = feed(vec![
            StreamEvent::ContentBlockStop { index: 7 },
            StreamEvent::Unknown { kind: "reasoning_content".into() },
            StreamEvent::text_delta(0, "hi"),
            stop(StopReason::EndTurn),
            StreamEvent::Unknown { kind: "trailer".into() },
        ])
        .unwrap();

        assert_eq!(acc.finish().unwrap().text, "hi");
    }

    #[test]
    fn missing_message_stop_is_malformed() {
        let acc = feed(vec![StreamEvent::text_delta(0, "partial")]).unwrap();

        assert!(!acc.is_complete());
        assert!(matches!(acc.finish(), Err(PalaverError::MalformedStream(_))));
    }

    #[test]
    fn from_message_collects_tool_uses() {
        let message = Message::new(
            Role::Assistant,
            vec![
                ContentBlock::text("Looking it up."),
                ContentBlock::ToolUse(ToolUse {
                    id: "tu-1".into(),
                    name: "get_lat_long".into(),
                    input: json!({ "place": "Beijing" }),
                }),
            ],
        );

        let turn = TurnOutput::from_message(message, StopReason::ToolUse, None);
        assert_eq!(turn.text, "Looking it up.");
        assert_eq!(turn.tool_uses[0].index, 1);
        assert_eq!(turn.tool_uses[0].input_json, r#"{"place":"Beijing"}"#);
    }
}
