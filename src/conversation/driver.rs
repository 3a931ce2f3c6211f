//! Conversation driver: the model/tool loop.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use futures::StreamExt;
use serde::Serialize;
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{ConversationEvent, ConversationEventSink};
use super::history::History;
use crate::config::{PalaverConfig, DEFAULT_MAX_TURNS, DEFAULT_SYSTEM_PROMPT};
use crate::error::PalaverError;
use crate::stream::{PendingToolUse, TurnAccumulator, TurnOutput};
use crate::tools::ToolRegistry;
use crate::transport::{ConverseRequest, ModelTransport};
use crate::types::{BlockDelta, Message, Role, StopReason, StreamEvent, Usage};
use crate::util::timeout::guarded;

/// Consecutive tool-use stops without a tool-use block tolerated before failing.
pub const DEFAULT_MAX_EMPTY_TURNS: usize = 3;

/// Recorded in history for a final turn without text, so the assistant
/// message is never empty.
pub const EMPTY_ANSWER_PLACEHOLDER: &str = "(no answer)";

/// Where the driver is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DriverState {
    AwaitingModel,
    ProcessingTurn,
    DispatchingTool,
    Done,
}

/// Per-conversation settings.
#[derive(Debug, Clone, Builder)]
pub struct ConversationOptions {
    #[builder(into)]
    pub model_id: String,
    #[builder(into, default = DEFAULT_SYSTEM_PROMPT.to_string())]
    pub system_prompt: String,
    /// Stream model turns instead of waiting for whole responses.
    #[builder(default)]
    pub stream: bool,
    /// Upper bound on model calls per run.
    #[builder(default = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,
    #[builder(default = DEFAULT_MAX_EMPTY_TURNS)]
    pub max_empty_turns: usize,
    /// Longest wait for the next model response or stream event.
    pub idle_timeout: Option<Duration>,
    /// Longest wait for one tool dispatch.
    pub tool_timeout: Option<Duration>,
}

impl ConversationOptions {
    pub fn from_config(config: &PalaverConfig) -> Self {
        Self::builder()
            .model_id(config.model_id())
            .system_prompt(config.system_prompt.clone())
            .stream(config.stream)
            .max_turns(config.max_turns)
            .build()
    }
}

/// Drives a conversation with a model, dispatching the tools it asks for.
///
/// One model request and at most one tool invocation are outstanding at a
/// time. History only ever receives complete messages: a tool-use turn is
/// committed together with its results once every tool has answered, so a
/// failure or cancellation mid-turn leaves no unmatched tool use behind.
pub struct Conversation {
    transport: Arc<dyn ModelTransport>,
    registry: ToolRegistry,
    options: ConversationOptions,
    history: History,
    state: DriverState,
    usage: Usage,
    cancel: CancellationToken,
    event_sink: Option<ConversationEventSink>,
}

impl Conversation {
    pub fn new(transport: Arc<dyn ModelTransport>, registry: ToolRegistry, options: ConversationOptions) -> Self {
        Self {
            transport,
            registry,
            options,
            history: History::new(),
            state: DriverState::AwaitingModel,
            usage: Usage::default(),
            cancel: CancellationToken::new(),
            event_sink: None,
        }
    }

    /// Start from an existing history instead of an empty one.
    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn with_event_sink(mut self, sink: ConversationEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts the running conversation when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Token usage summed over every model call so far.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn options(&self) -> &ConversationOptions {
        &self.options
    }

    /// Append a user question and run until the model ends its turn.
    pub async fn ask(&mut self, question: impl Into<String>) -> Result<String, PalaverError> {
        self.commit(Message::user(question));
        if self.options.stream {
            self.run_streaming().await
        } else {
            self.run().await
        }
    }

    /// Run the loop over the current history with whole-response model calls.
    pub async fn run(&mut self) -> Result<String, PalaverError> {
        self.drive(false).await
    }

    /// Run the loop over the current history with streamed model calls.
    pub async fn run_streaming(&mut self) -> Result<String, PalaverError> {
        self.drive(true).await
    }

    async fn drive(&mut self, streaming: bool) -> Result<String, PalaverError> {
        let result = self.drive_loop(streaming).await;
        if let Err(e) = &result {
            warn!(error = %e, state = %self.state, "conversation failed");
            self.set_state(DriverState::Done);
        }
        result
    }

    async fn drive_loop(&mut self, streaming: bool) -> Result<String, PalaverError> {
        let mut model_calls = 0usize;
        let mut empty_turns = 0usize;

        loop {
            if model_calls >= self.options.max_turns {
                return Err(PalaverError::TurnLimitExceeded(self.options.max_turns));
            }
            model_calls += 1;

            self.set_state(DriverState::AwaitingModel);
            let request = self.request();
            debug!(
                model = %request.model_id,
                messages = request.messages.len(),
                turn = model_calls,
                streaming,
                "calling model"
            );
            let turn = if streaming {
                self.stream_turn(&request).await?
            } else {
                self.whole_turn(&request).await?
            };

            self.set_state(DriverState::ProcessingTurn);
            if let Some(usage) = &turn.usage {
                self.usage.merge(usage);
            }
            self.emit(ConversationEvent::TurnCompleted {
                turn: model_calls,
                stop_reason: turn.stop_reason.clone(),
                usage: turn.usage,
            });

            match &turn.stop_reason {
                StopReason::EndTurn => {
                    if !turn.tool_uses.is_empty() {
                        warn!(
                            count = turn.tool_uses.len(),
                            "ignoring tool uses in a turn that ended normally"
                        );
                    }
                    if turn.text.trim().is_empty() {
                        debug!("final turn has no text, recording placeholder");
                        self.commit(Message::assistant(EMPTY_ANSWER_PLACEHOLDER));
                    } else {
                        self.commit(Message::assistant(turn.text.clone()));
                    }
                    self.set_state(DriverState::Done);
                    return Ok(turn.text);
                }
                StopReason::ToolUse if turn.tool_uses.is_empty() => {
                    if !turn.text.trim().is_empty() {
                        return Err(PalaverError::MalformedStream(
                            "tool_use stop without a tool-use block".into(),
                        ));
                    }
                    empty_turns += 1;
                    if empty_turns > self.options.max_empty_turns {
                        return Err(PalaverError::MalformedStream(format!(
                            "{empty_turns} consecutive empty tool_use turns"
                        )));
                    }
                    warn!(empty_turns, "empty tool_use turn, asking again");
                }
                StopReason::ToolUse => {
                    empty_turns = 0;
                    self.set_state(DriverState::DispatchingTool);
                    let results = self.dispatch_all(&turn.tool_uses).await?;
                    let assistant = turn.to_message();
                    self.history.commit_tool_turn(assistant.clone(), results.clone());
                    self.emit(ConversationEvent::MessageCommitted { message: assistant });
                    self.emit(ConversationEvent::MessageCommitted { message: results });
                }
                StopReason::Other(reason) => {
                    return Err(PalaverError::UnexpectedStop(reason.clone()));
                }
            }
        }
    }

    fn request(&self) -> ConverseRequest {
        ConverseRequest {
            model_id: self.options.model_id.clone(),
            system_prompt: self.options.system_prompt.clone(),
            messages: self.history.messages().to_vec(),
            tools: self.registry.specs(),
        }
    }

    async fn whole_turn(&self, request: &ConverseRequest) -> Result<TurnOutput, PalaverError> {
        let response = guarded(
            &self.cancel,
            self.options.idle_timeout,
            self.transport.converse(request),
        )
        .await?;

        let turn = TurnOutput::from_message(response.message, response.stop_reason, response.usage);
        if !turn.text.is_empty() {
            self.emit(ConversationEvent::TextDelta { text: turn.text.clone() });
        }
        Ok(turn)
    }

    async fn stream_turn(&self, request: &ConverseRequest) -> Result<TurnOutput, PalaverError> {
        let idle = self.options.idle_timeout;
        let mut stream = guarded(&self.cancel, idle, self.transport.converse_stream(request)).await?;
        let mut accumulator = TurnAccumulator::new();

        while let Some(event) = guarded(&self.cancel, idle, async { Ok(stream.next().await) }).await? {
            let event = event?;
            let text = match &event {
                StreamEvent::ContentBlockDelta {
                    delta: BlockDelta::Text(text),
                    ..
                } => Some(text.clone()),
                _ => None,
            };
            accumulator.apply(event)?;
            if let Some(text) = text {
                self.emit(ConversationEvent::TextDelta { text });
            }
        }

        accumulator.finish()
    }

    /// Dispatch every tool use of a turn in order and merge the results into
    /// one user message.
    async fn dispatch_all(&self, tool_uses: &[PendingToolUse]) -> Result<Message, PalaverError> {
        let mut content = Vec::with_capacity(tool_uses.len());
        for tool_use in tool_uses {
            info!(tool = %tool_use.name, id = %tool_use.id, "model requested tool");
            self.emit(ConversationEvent::ToolUseRequested {
                id: tool_use.id.clone(),
                name: tool_use.name.clone(),
                input: tool_use.input.clone(),
            });

            let message = guarded(
                &self.cancel,
                self.options.tool_timeout,
                self.registry
                    .dispatch(&tool_use.id, &tool_use.name, &tool_use.input_json),
            )
            .await?;

            self.emit(ConversationEvent::ToolCompleted {
                id: tool_use.id.clone(),
                name: tool_use.name.clone(),
                is_error: message.tool_results().iter().any(|r| r.is_error),
            });
            content.extend(message.content);
        }
        Ok(Message::new(Role::User, content))
    }

    fn commit(&mut self, message: Message) {
        self.history.push(message.clone());
        self.emit(ConversationEvent::MessageCommitted { message });
    }

    fn set_state(&mut self, state: DriverState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "driver state");
            self.state = state;
            self.emit(ConversationEvent::StateChanged { state });
        }
    }

    fn emit(&self, event: ConversationEvent) {
        if let Some(sink) = &self.event_sink {
            sink(event);
        }
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("transport", &self.transport.name())
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("state", &self.state)
            .field("messages", &self.history.len())
            .finish()
    }
}
