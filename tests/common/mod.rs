//! Shared test helpers and scripted transport.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use palaver::error::PalaverError;
use palaver::tools::{FnTool, SchemaBuilder, Tool, ToolOutput};
use palaver::transport::{ConverseRequest, ConverseResponse, ModelTransport};
use palaver::types::*;

enum ScriptedTurn {
    Response(ConverseResponse),
    Stream(Vec<StreamEvent>),
    /// Events, then a stream that never yields again.
    StreamThenHang(Vec<StreamEvent>),
}

/// A transport that replays queued turns and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<ConverseRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, turn: ScriptedTurn) {
        self.turns.lock().unwrap().push_back(turn);
    }

    /// Queue a whole-response turn.
    pub fn queue_response(&self, content: Vec<ContentBlock>, stop_reason: StopReason) {
        self.push(ScriptedTurn::Response(ConverseResponse {
            message: Message::new(Role::Assistant, content),
            stop_reason,
            usage: Some(usage(10, 20)),
        }));
    }

    /// Queue a whole-response final answer.
    pub fn queue_text(&self, text: &str) {
        self.queue_response(vec![ContentBlock::text(text)], StopReason::EndTurn);
    }

    /// Queue a whole-response tool use.
    pub fn queue_tool_use(&self, id: &str, name: &str, input: serde_json::Value) {
        self.queue_response(
            vec![ContentBlock::ToolUse(ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            })],
            StopReason::ToolUse,
        );
    }

    /// Queue a streamed turn.
    pub fn queue_stream(&self, events: Vec<StreamEvent>) {
        self.push(ScriptedTurn::Stream(events));
    }

    pub fn queue_stream_then_hang(&self, events: Vec<StreamEvent>) {
        self.push(ScriptedTurn::StreamThenHang(events));
    }

    pub fn requests(&self) -> Vec<ConverseRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_turn(&self, request: &ConverseRequest) -> Result<ScriptedTurn, PalaverError> {
        self.requests.lock().unwrap().push(request.clone());
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PalaverError::Transport("script exhausted".into()))
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse, PalaverError> {
        match self.next_turn(request)? {
            ScriptedTurn::Response(response) => Ok(response),
            _ => Err(PalaverError::Transport("scripted a stream, got converse".into())),
        }
    }

    async fn converse_stream(
        &self,
        request: &ConverseRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent, PalaverError>>, PalaverError> {
        match self.next_turn(request)? {
            ScriptedTurn::Stream(events) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
            ScriptedTurn::StreamThenHang(events) => Ok(stream::iter(events.into_iter().map(Ok))
                .chain(stream::pending::<Result<StreamEvent, PalaverError>>())
                .boxed()),
            ScriptedTurn::Response(_) => Err(PalaverError::Transport("scripted a response, got stream".into())),
        }
    }
}

pub fn usage(input: u32, output: u32) -> Usage {
    Usage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: input + output,
    }
}

/// A streamed final answer split into `chunks`.
pub fn text_stream(chunks: &[&str]) -> Vec<StreamEvent> {
    let mut events = vec![StreamEvent::MessageStart { role: Role::Assistant }];
    events.extend(chunks.iter().map(|chunk| StreamEvent::text_delta(0, *chunk)));
    events.push(StreamEvent::ContentBlockStop { index: 0 });
    events.push(StreamEvent::MessageStop {
        stop_reason: StopReason::EndTurn,
    });
    events.push(StreamEvent::Metadata {
        usage: Some(usage(10, 20)),
    });
    events
}

/// A streamed tool use whose input arrives as `fragments`.
pub fn tool_stream(id: &str, name: &str, fragments: &[&str]) -> Vec<StreamEvent> {
    let mut events = vec![
        StreamEvent::MessageStart { role: Role::Assistant },
        StreamEvent::tool_use_start(0, id, name),
    ];
    events.extend(fragments.iter().map(|f| StreamEvent::tool_input_delta(0, *f)));
    events.push(StreamEvent::ContentBlockStop { index: 0 });
    events.push(StreamEvent::MessageStop {
        stop_reason: StopReason::ToolUse,
    });
    events.push(StreamEvent::Metadata {
        usage: Some(usage(10, 5)),
    });
    events
}

/// Canned `get_lat_long` that records the places it was asked about.
pub fn fake_location_tool(calls: Arc<Mutex<Vec<String>>>) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "get_lat_long",
        "Returns the latitude and longitude for a given place name",
        SchemaBuilder::object().string("place", "Place name", true).build(),
        move |args| {
            let calls = Arc::clone(&calls);
            async move {
                calls.lock().unwrap().push(args.get_str("place")?.to_string());
                Ok::<_, PalaverError>(ToolOutput::Value(
                    serde_json::json!({ "latitude": "39.9042", "longitude": "116.4074" }),
                ))
            }
        },
    ))
}

/// Canned `get_weather` that records the coordinates it was asked about.
pub fn fake_weather_tool(calls: Arc<Mutex<Vec<String>>>) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "get_weather",
        "Returns weather data for a given latitude and longitude",
        SchemaBuilder::object()
            .string("latitude", "Latitude", true)
            .string("longitude", "Longitude", true)
            .build(),
        move |args| {
            let calls = Arc::clone(&calls);
            async move {
                let coords = format!("{},{}", args.get_str("latitude")?, args.get_str("longitude")?);
                calls.lock().unwrap().push(coords);
                Ok::<_, PalaverError>(ToolOutput::Value(
                    serde_json::json!({ "current_weather": { "temperature": 25.1 } }),
                ))
            }
        },
    ))
}
