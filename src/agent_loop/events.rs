//! Streaming callbacks and the event values sinks receive.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::SwarmError;
use crate::types::{Message, ToolCall};

/// Receives incremental output of one streaming gateway call.
///
/// Per call: `on_start` once, then tokens and tool calls, then exactly one of
/// `on_complete` or `on_error`. Nothing fires after the terminal callback.
pub trait StreamHandler: Send + Sync {
    fn on_start(&self) {}

    /// A non-empty content fragment.
    fn on_token(&self, _token: &str) {}

    /// A tool call whose fragments are complete.
    fn on_tool_call(&self, _call: &ToolCall) {}

    /// The assembled assistant message.
    fn on_complete(&self, _message: &Message) {}

    fn on_error(&self, _error: &SwarmError) {}
}

/// Serializable mirror of the [`StreamHandler`] callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Start,
    Token { text: String },
    ToolCall { call: ToolCall },
    Complete { message: Message },
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// Callback used for streaming events.
pub type StreamEventSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Forwards every callback to a closure as a [`StreamEvent`].
#[derive(Clone)]
pub struct FnStreamHandler {
    sink: StreamEventSink,
}

impl FnStreamHandler {
    pub fn new(sink: impl Fn(StreamEvent) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }
}

impl StreamHandler for FnStreamHandler {
    fn on_start(&self) {
        (self.sink)(StreamEvent::Start);
    }

    fn on_token(&self, token: &str) {
        (self.sink)(StreamEvent::Token {
            text: token.to_string(),
        });
    }

    fn on_tool_call(&self, call: &ToolCall) {
        (self.sink)(StreamEvent::ToolCall { call: call.clone() });
    }

    fn on_complete(&self, message: &Message) {
        (self.sink)(StreamEvent::Complete {
            message: message.clone(),
        });
    }

    fn on_error(&self, error: &SwarmError) {
        (self.sink)(StreamEvent::Error {
            message: error.to_string(),
        });
    }
}

impl std::fmt::Debug for FnStreamHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStreamHandler").finish_non_exhaustive()
    }
}

/// Sends events on an unbounded channel. Events are dropped once the
/// receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelStreamHandler {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelStreamHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }
}

impl StreamHandler for ChannelStreamHandler {
    fn on_start(&self) {
        self.send(StreamEvent::Start);
    }

    fn on_token(&self, token: &str) {
        self.send(StreamEvent::Token {
            text: token.to_string(),
        });
    }

    fn on_tool_call(&self, call: &ToolCall) {
        self.send(StreamEvent::ToolCall { call: call.clone() });
    }

    fn on_complete(&self, message: &Message) {
        self.send(StreamEvent::Complete {
            message: message.clone(),
        });
    }

    fn on_error(&self, error: &SwarmError) {
        self.send(StreamEvent::Error {
            message: error.to_string(),
        });
    }
}

/// Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStreamHandler;

impl StreamHandler for NoopStreamHandler {}
