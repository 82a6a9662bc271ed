//! Shared test helpers and a scripted gateway.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use swarmkit::error::SwarmError;
use swarmkit::gateway::{response_to_chunks, CompletionRequest, CompletionResponse, Gateway};
use swarmkit::prelude::*;
use std::result::Result;

/// One scripted gateway answer.
pub enum Step {
    Reply(CompletionResponse),
    Fail(SwarmError),
    /// Streaming items, yielded as-is. Non-streaming calls get an error.
    Stream(Vec<Result<StreamChunk, SwarmError>>),
    /// Streaming items followed by a stream that never ends.
    Hang(Vec<StreamChunk>),
}

/// A gateway that replays a script and records every request.
///
/// Steps are consumed in call order. Once the script is empty the `repeat`
/// message is returned if set, else `"ok from {model}"`.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Step>>,
    repeat: Mutex<Option<Message>>,
    delays: Mutex<HashMap<String, Duration>>,
    panics: Mutex<HashSet<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn then(self, step: Step) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn reply(self, message: Message) -> Self {
        let usage = Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        };
        self.then(Step::Reply(CompletionResponse {
            message,
            usage,
            finish_reason: None,
        }))
    }

    pub fn reply_text(self, text: &str) -> Self {
        self.reply(Message::assistant(text))
    }

    pub fn reply_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.reply(Message::assistant_tool_calls("", calls))
    }

    pub fn fail(self, error: SwarmError) -> Self {
        self.then(Step::Fail(error))
    }

    pub fn stream(self, items: Vec<Result<StreamChunk, SwarmError>>) -> Self {
        self.then(Step::Stream(items))
    }

    pub fn hang(self, chunks: Vec<StreamChunk>) -> Self {
        self.then(Step::Hang(chunks))
    }

    /// Answer with `message` forever once the script is exhausted.
    pub fn repeat(self, message: Message) -> Self {
        *self.repeat.lock().unwrap() = Some(message);
        self
    }

    /// Sleep before answering requests for `model`.
    pub fn delay_for_model(self, model: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(model.to_string(), delay);
        self
    }

    /// Panic inside the gateway for requests for `model`.
    pub fn panic_for_model(self, model: &str) -> Self {
        self.panics.lock().unwrap().insert(model.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.complete_calls() + self.stream_calls()
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    async fn begin(&self, request: &CompletionRequest) -> Option<Step> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = self.delays.lock().unwrap().get(&request.model).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics.lock().unwrap().contains(&request.model) {
            panic!("gateway exploded for {}", request.model);
        }
        self.script.lock().unwrap().pop_front()
    }

    fn fallback(&self, request: &CompletionRequest) -> CompletionResponse {
        let message = self
            .repeat
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Message::assistant(format!("ok from {}", request.model)));
        CompletionResponse::new(message)
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SwarmError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        match self.begin(request).await {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Stream(_)) | Some(Step::Hang(_)) => Err(SwarmError::Stream(
                "scripted stream step used by a non-streaming call".into(),
            )),
            None => Ok(self.fallback(request)),
        }
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk, SwarmError>>, SwarmError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        match self.begin(request).await {
            Some(Step::Reply(response)) => Ok(Box::pin(stream::iter(
                response_to_chunks(response).into_iter().map(Ok),
            ))),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Stream(items)) => Ok(Box::pin(stream::iter(items))),
            Some(Step::Hang(chunks)) => Ok(Box::pin(
                stream::iter(chunks.into_iter().map(Ok)).chain(stream::pending()),
            )),
            None => Ok(Box::pin(stream::iter(
                response_to_chunks(self.fallback(request))
                    .into_iter()
                    .map(Ok),
            ))),
        }
    }
}

/// Stream handler that records every event.
pub fn recorder() -> (FnStreamHandler, Arc<Mutex<Vec<StreamEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let handler = FnStreamHandler::new(move |event| sink.lock().unwrap().push(event));
    (handler, events)
}

/// A tool returning a fixed value.
pub fn constant_tool(name: &str, value: &'static str) -> Arc<dyn Tool> {
    FunctionTool::from_fn(name, "Returns a constant", ToolParameters::empty(), move |_, _| {
        Ok(value)
    })
    .shared()
}

/// A tool that hands the conversation to `target`.
pub fn transfer_tool(name: &str, target: Agent) -> Arc<dyn Tool> {
    FunctionTool::from_fn(
        name,
        "Transfers the conversation",
        ToolParameters::empty(),
        move |_, _| Ok(target.clone()),
    )
    .shared()
}

/// A tool counting its invocations.
pub fn counting_tool(name: &str) -> (Arc<dyn Tool>, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    let tool = FunctionTool::from_fn(name, "Counts calls", ToolParameters::empty(), move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok("counted")
    })
    .shared();
    (tool, counter)
}

pub fn call(id: &str, name: &str) -> ToolCall {
    ToolCall::new(id, name, serde_json::json!({}))
}

pub fn swarm(gateway: &Arc<ScriptedGateway>) -> Swarm {
    Swarm::new(Arc::clone(gateway) as Arc<dyn Gateway>)
}
