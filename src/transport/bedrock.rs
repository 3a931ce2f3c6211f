//! Amazon Bedrock transport using the Converse API.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::types::{
    ContentBlock as BedrockBlock, ContentBlockDelta, ContentBlockStart, ConversationRole, ConverseOutput,
    ConverseStreamOutput, Message as BedrockMessage, SystemContentBlock, TokenUsage, Tool, ToolConfiguration,
    ToolInputSchema, ToolResultBlock, ToolResultContentBlock, ToolResultStatus, ToolSpecification, ToolUseBlock,
};
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_smithy_types::Document;
use futures::stream::BoxStream;
use tracing::{debug, error};

use super::{ConverseRequest, ConverseResponse, ModelTransport};
use crate::error::PalaverError;
use crate::tools::ToolSpec;
use crate::types::{
    BlockDelta, BlockStart, ContentBlock, Message, Role, StopReason, StreamEvent, ToolResultContent, ToolUse, Usage,
};

/// Bedrock Converse transport.
#[derive(Debug, Clone)]
pub struct BedrockTransport {
    client: BedrockClient,
}

impl BedrockTransport {
    /// Build a client for `region` using the default AWS credential chain.
    pub async fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        debug!(%region, "building bedrock client");
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .load()
            .await;
        Self::from_client(BedrockClient::new(&aws_config))
    }

    pub fn from_client(client: BedrockClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModelTransport for BedrockTransport {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse, PalaverError> {
        let mut converse = self
            .client
            .converse()
            .model_id(&request.model_id)
            .system(SystemContentBlock::Text(request.system_prompt.clone()))
            .set_messages(Some(to_bedrock_messages(&request.messages)?));
        if let Some(tool_config) = build_tool_config(&request.tools)? {
            converse = converse.tool_config(tool_config);
        }

        let output = converse.send().await.map_err(|e| {
            error!(model = %request.model_id, error = %e, "bedrock converse failed");
            PalaverError::Transport(e.to_string())
        })?;

        let stop_reason = StopReason::from_provider(output.stop_reason().as_str());
        let usage = output.usage().map(to_usage);
        let message = match output.output() {
            Some(ConverseOutput::Message(message)) => from_bedrock_message(message),
            _ => {
                return Err(PalaverError::Transport(
                    "converse response carried no message".into(),
                ))
            }
        };

        Ok(ConverseResponse {
            message,
            stop_reason,
            usage,
        })
    }

    async fn converse_stream(
        &self,
        request: &ConverseRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent, PalaverError>>, PalaverError> {
        let mut converse = self
            .client
            .converse_stream()
            .model_id(&request.model_id)
            .system(SystemContentBlock::Text(request.system_prompt.clone()))
            .set_messages(Some(to_bedrock_messages(&request.messages)?));
        if let Some(tool_config) = build_tool_config(&request.tools)? {
            converse = converse.tool_config(tool_config);
        }

        let output = converse.send().await.map_err(|e| {
            error!(model = %request.model_id, error = %e, "bedrock converse_stream failed");
            PalaverError::Transport(e.to_string())
        })?;
        let mut receiver = output.stream;

        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(Some(event)) => yield to_stream_event(event),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(PalaverError::Transport(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn block_index(index: i32) -> Result<usize, PalaverError> {
    usize::try_from(index)
        .map_err(|_| PalaverError::MalformedStream(format!("negative content block index {index}")))
}

/// Map one Bedrock stream event onto a [`StreamEvent`].
fn to_stream_event(event: ConverseStreamOutput) -> Result<StreamEvent, PalaverError> {
    let event = match event {
        ConverseStreamOutput::MessageStart(start) => StreamEvent::MessageStart {
            role: match start.role() {
                ConversationRole::User => Role::User,
                _ => Role::Assistant,
            },
        },
        ConverseStreamOutput::ContentBlockStart(start) => {
            let index = block_index(start.content_block_index())?;
            match start.start() {
                Some(ContentBlockStart::ToolUse(tool)) => {
                    StreamEvent::tool_use_start(index, tool.tool_use_id(), tool.name())
                }
                _ => StreamEvent::ContentBlockStart {
                    index,
                    start: BlockStart::Text,
                },
            }
        }
        ConverseStreamOutput::ContentBlockDelta(delta) => {
            let index = block_index(delta.content_block_index())?;
            match delta.delta() {
                Some(ContentBlockDelta::Text(text)) => StreamEvent::ContentBlockDelta {
                    index,
                    delta: BlockDelta::Text(text.clone()),
                },
                Some(ContentBlockDelta::ToolUse(tool)) => StreamEvent::ContentBlockDelta {
                    index,
                    delta: BlockDelta::ToolUseInput(tool.input().to_string()),
                },
                _ => StreamEvent::Unknown {
                    kind: "content_block_delta".into(),
                },
            }
        }
        ConverseStreamOutput::ContentBlockStop(stop) => StreamEvent::ContentBlockStop {
            index: block_index(stop.content_block_index())?,
        },
        ConverseStreamOutput::MessageStop(stop) => StreamEvent::MessageStop {
            stop_reason: StopReason::from_provider(stop.stop_reason().as_str()),
        },
        ConverseStreamOutput::Metadata(meta) => StreamEvent::Metadata {
            usage: meta.usage().map(to_usage),
        },
        other => StreamEvent::Unknown {
            kind: format!("{other:?}"),
        },
    };
    Ok(event)
}

#[allow(clippy::cast_sign_loss)]
fn to_usage(usage: &TokenUsage) -> Usage {
    Usage {
        input_tokens: usage.input_tokens() as u32,
        output_tokens: usage.output_tokens() as u32,
        total_tokens: usage.total_tokens() as u32,
    }
}

fn build_tool_config(tools: &[ToolSpec]) -> Result<Option<ToolConfiguration>, PalaverError> {
    if tools.is_empty() {
        return Ok(None);
    }
    let tools = tools
        .iter()
        .map(|spec| {
            ToolSpecification::builder()
                .name(&spec.name)
                .description(&spec.description)
                .input_schema(ToolInputSchema::Json(value_to_document(&spec.input_schema)))
                .build()
                .map(Tool::ToolSpec)
                .map_err(|e| PalaverError::Transport(format!("invalid tool spec {}: {e}", spec.name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    ToolConfiguration::builder()
        .set_tools(Some(tools))
        .build()
        .map(Some)
        .map_err(|e| PalaverError::Transport(format!("invalid tool configuration: {e}")))
}

fn to_bedrock_messages(messages: &[Message]) -> Result<Vec<BedrockMessage>, PalaverError> {
    messages.iter().map(to_bedrock_message).collect()
}

fn to_bedrock_message(message: &Message) -> Result<BedrockMessage, PalaverError> {
    let role = match message.role {
        Role::User => ConversationRole::User,
        Role::Assistant => ConversationRole::Assistant,
    };

    let mut blocks = Vec::with_capacity(message.content.len());
    for block in &message.content {
        match block {
            // Bedrock rejects blank text blocks.
            ContentBlock::Text { text } if text.trim().is_empty() => {}
            ContentBlock::Text { text } => blocks.push(BedrockBlock::Text(text.clone())),
            ContentBlock::ToolUse(tool_use) => {
                let block = ToolUseBlock::builder()
                    .tool_use_id(&tool_use.id)
                    .name(&tool_use.name)
                    .input(value_to_document(&tool_use.input))
                    .build()
                    .map_err(|e| PalaverError::Transport(format!("invalid tool use: {e}")))?;
                blocks.push(BedrockBlock::ToolUse(block));
            }
            ContentBlock::ToolResult(result) => {
                let content = result
                    .content
                    .iter()
                    .map(|item| match item {
                        ToolResultContent::Json(value) => ToolResultContentBlock::Json(value_to_document(value)),
                        ToolResultContent::Text(text) => ToolResultContentBlock::Text(text.clone()),
                    })
                    .collect();
                let mut builder = ToolResultBlock::builder()
                    .tool_use_id(&result.tool_use_id)
                    .set_content(Some(content));
                if result.is_error {
                    builder = builder.status(ToolResultStatus::Error);
                }
                let block = builder
                    .build()
                    .map_err(|e| PalaverError::Transport(format!("invalid tool result: {e}")))?;
                blocks.push(BedrockBlock::ToolResult(block));
            }
        }
    }

    BedrockMessage::builder()
        .role(role)
        .set_content(Some(blocks))
        .build()
        .map_err(|e| PalaverError::Transport(format!("invalid message: {e}")))
}

fn from_bedrock_message(message: &BedrockMessage) -> Message {
    let role = match message.role() {
        ConversationRole::User => Role::User,
        _ => Role::Assistant,
    };
    let content = message
        .content()
        .iter()
        .filter_map(|block| match block {
            BedrockBlock::Text(text) => Some(ContentBlock::text(text.clone())),
            BedrockBlock::ToolUse(tool_use) => Some(ContentBlock::ToolUse(ToolUse {
                id: tool_use.tool_use_id().to_string(),
                name: tool_use.name().to_string(),
                input: document_to_value(tool_use.input()),
            })),
            other => {
                debug!(block = ?other, "dropping unsupported response content block");
                None
            }
        })
        .collect();
    Message::new(role, content)
}

/// Convert a `serde_json::Value` to an AWS `Document`.
fn value_to_document(value: &serde_json::Value) -> Document {
    match value {
        serde_json::Value::Null => Document::Null,
        serde_json::Value::Bool(b) => Document::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(aws_smithy_types::Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(aws_smithy_types::Number::NegInt(i))
            } else {
                n.as_f64()
                    .map_or(Document::Null, |f| Document::Number(aws_smithy_types::Number::Float(f)))
            }
        }
        serde_json::Value::String(s) => Document::String(s.clone()),
        serde_json::Value::Array(items) => Document::Array(items.iter().map(value_to_document).collect()),
        serde_json::Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_document(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

/// Convert an AWS `Document` to a `serde_json::Value`.
fn document_to_value(doc: &Document) -> serde_json::Value {
    match doc {
        Document::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), document_to_value(v))).collect(),
        ),
        Document::Array(items) => serde_json::Value::Array(items.iter().map(document_to_value).collect()),
        Document::Number(aws_smithy_types::Number::PosInt(u)) => serde_json::Value::from(*u),
        Document::Number(aws_smithy_types::Number::NegInt(i)) => serde_json::Value::from(*i),
        Document::Number(aws_smithy_types::Number::Float(f)) => {
            serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
        }
        Document::String(s) => serde_json::Value::String(s.clone()),
        Document::Bool(b) => serde_json::Value::Bool(*b),
        Document::Null => serde_json::Value::Null,
    }
}
