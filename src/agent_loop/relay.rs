//! Enforces the stream callback protocol over one streaming gateway call and
//! assembles the final assistant message.

use std::collections::BTreeMap;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::SwarmError;
use crate::gateway::{CompletionRequest, CompletionResponse, Gateway};
use crate::tools::arguments::parse_argument_text;
use crate::types::{FinishReason, Message, StreamChunk, ToolCall, Usage};

use super::events::StreamHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayState {
    Idle,
    Streaming,
    Finished,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl PartialCall {
    fn to_call(&self) -> ToolCall {
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
        ToolCall::new(id, self.name.clone(), parse_argument_text(&self.arguments))
    }
}

/// Callback state machine for a single streaming call.
///
/// Every method is a no-op once a terminal callback has fired.
pub(crate) struct Relay<'a> {
    handler: &'a dyn StreamHandler,
    sender: String,
    state: RelayState,
    content: String,
    calls: BTreeMap<usize, PartialCall>,
    /// Calls below this index have been announced.
    announced_below: usize,
    announced: Vec<ToolCall>,
    usage: Usage,
    finish_reason: Option<FinishReason>,
}

impl<'a> Relay<'a> {
    pub(crate) fn new(handler: &'a dyn StreamHandler, sender: impl Into<String>) -> Self {
        Self {
            handler,
            sender: sender.into(),
            state: RelayState::Idle,
            content: String::new(),
            calls: BTreeMap::new(),
            announced_below: 0,
            announced: Vec::new(),
            usage: Usage::default(),
            finish_reason: None,
        }
    }

    fn live(&self) -> bool {
        self.state == RelayState::Streaming
    }

    pub(crate) fn start(&mut self) {
        if self.state == RelayState::Idle {
            self.state = RelayState::Streaming;
            self.handler.on_start();
        }
    }

    pub(crate) fn token(&mut self, text: &str) {
        if !self.live() || text.is_empty() {
            return;
        }
        self.content.push_str(text);
        self.handler.on_token(text);
    }

    pub(crate) fn tool_fragment(
        &mut self,
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: &str,
    ) {
        if !self.live() {
            return;
        }
        if index < self.announced_below {
            tracing::warn!(index, "tool call fragment arrived after the call was announced");
            return;
        }
        self.announce_below(index);
        let call = self.calls.entry(index).or_default();
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            call.id.get_or_insert(id);
        }
        if let Some(name) = name {
            call.name.push_str(&name);
        }
        call.arguments.push_str(arguments);
    }

    pub(crate) fn done(&mut self, finish_reason: Option<FinishReason>, usage: Option<Usage>) {
        if finish_reason.is_some() {
            self.finish_reason = finish_reason;
        }
        if let Some(usage) = usage {
            self.usage = usage;
        }
    }

    /// Announce every buffered call with an index below `limit`, in order.
    fn announce_below(&mut self, limit: usize) {
        if limit <= self.announced_below {
            return;
        }
        for (_, partial) in self.calls.range(self.announced_below..limit) {
            let call = partial.to_call();
            self.handler.on_tool_call(&call);
            self.announced.push(call);
        }
        self.announced_below = limit;
    }

    /// Fire `on_complete` and hand back the assembled response.
    pub(crate) fn complete(mut self) -> Result<CompletionResponse, SwarmError> {
        if !self.live() {
            return Err(SwarmError::Stream(
                "stream relay completed twice".to_string(),
            ));
        }
        let end = self.calls.keys().next_back().map_or(0, |last| last + 1);
        self.announce_below(end);
        self.state = RelayState::Finished;

        let message = Message::assistant_tool_calls(self.content, self.announced)
            .with_sender(self.sender);
        self.handler.on_complete(&message);
        Ok(CompletionResponse {
            message,
            usage: self.usage,
            finish_reason: self.finish_reason,
        })
    }

    /// Fire `on_error` once.
    pub(crate) fn fail(&mut self, error: &SwarmError) {
        if self.state == RelayState::Finished {
            return;
        }
        if self.state == RelayState::Idle {
            self.start();
        }
        self.state = RelayState::Finished;
        self.handler.on_error(error);
    }
}

/// Drive one streaming gateway call through `handler`.
///
/// Opening the stream, every item and the end of the stream all race
/// `cancel`. Any failure fires `on_error` before it is returned.
pub(crate) async fn relay_stream(
    gateway: &dyn Gateway,
    request: &CompletionRequest,
    handler: &dyn StreamHandler,
    cancel: &CancellationToken,
    sender: &str,
) -> Result<CompletionResponse, SwarmError> {
    let mut relay = Relay::new(handler, sender);
    relay.start();

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SwarmError::Canceled),
        opened = gateway.stream(request) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(err) => {
            relay.fail(&err);
            return Err(err);
        }
    };

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => Some(Err(SwarmError::Canceled)),
            item = stream.next() => item,
        };
        match item {
            None => break,
            Some(Ok(StreamChunk::Content { text })) => relay.token(&text),
            Some(Ok(StreamChunk::ToolCall {
                index,
                id,
                name,
                arguments,
            })) => relay.tool_fragment(index, id, name, &arguments),
            Some(Ok(StreamChunk::Done {
                finish_reason,
                usage,
            })) => {
                relay.done(finish_reason, usage);
                break;
            }
            Some(Err(err)) => {
                relay.fail(&err);
                return Err(err);
            }
        }
    }

    relay.complete()
}
