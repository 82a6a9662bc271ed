//! Completion gateway trait and implementations.

pub mod http;

#[cfg(feature = "openai")]
pub mod openai;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};

use crate::error::SwarmError;
use crate::tools::ToolDefinition;
use crate::types::{FinishReason, Message, StreamChunk, Usage};

#[cfg(feature = "openai")]
pub use openai::OpenAiGateway;

/// One request to the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    /// Full request history, system message first.
    pub messages: Vec<Message>,
    /// Declared tools. Empty when the agent has none.
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<String>,
    pub parallel_tool_calls: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: None,
            parallel_tool_calls: true,
        }
    }

    /// Text of the leading system message, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == crate::types::Role::System)
            .map(|m| m.content.as_str())
    }
}

/// Non-streaming completion result.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Assistant message, possibly carrying tool calls.
    pub message: Message,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}

impl CompletionResponse {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: Usage::default(),
            finish_reason: None,
        }
    }
}

/// Core trait implemented by every completion service transport.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "gateway"
    }

    /// Produce one complete assistant message.
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, SwarmError>;

    /// Stream an assistant message as incremental chunks.
    ///
    /// The default replays [`Gateway::complete`] as a single burst of chunks,
    /// for transports without native streaming.
    async fn stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk, SwarmError>>, SwarmError> {
        let response = self.complete(request).await?;
        Ok(Box::pin(stream::iter(
            response_to_chunks(response).into_iter().map(Ok),
        )))
    }
}

/// Split a complete response into the chunks a streaming call would yield.
pub fn response_to_chunks(response: CompletionResponse) -> Vec<StreamChunk> {
    let CompletionResponse {
        message,
        usage,
        finish_reason,
    } = response;
    let mut chunks = Vec::with_capacity(message.tool_calls.len() + 2);
    if !message.content.is_empty() {
        chunks.push(StreamChunk::content(message.content));
    }
    for (index, call) in message.tool_calls.into_iter().enumerate() {
        let arguments = match call.arguments {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
        chunks.push(StreamChunk::ToolCall {
            index,
            id: Some(call.id),
            name: Some(call.name),
            arguments,
        });
    }
    chunks.push(StreamChunk::Done {
        finish_reason,
        usage: Some(usage),
    });
    chunks
}
