//! OpenAI-compatible Chat Completions gateway.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{SwarmConfig, DEFAULT_BASE_URL};
use crate::error::SwarmError;
use crate::tools::arguments::parse_argument_text;
use crate::types::{FinishReason, Message, Role, StreamChunk, ToolCall, Usage};
use crate::util::retry::RetryPolicy;

use super::http::{
    bearer_headers, build_client, parse_sse_line, status_to_error, SseLine, SseLineBuffer,
};
use super::{CompletionRequest, CompletionResponse, Gateway};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Talks to `{base_url}/chat/completions`.
pub struct OpenAiGateway {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAiGateway {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Result<Self, SwarmError> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
            client: build_client(DEFAULT_TIMEOUT)?,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    /// Build from resolved configuration. Requires an API key.
    pub fn from_config(config: &SwarmConfig) -> Result<Self, SwarmError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SwarmError::Authentication("Missing OPENAI_API_KEY".into()))?;
        Ok(Self {
            api_key,
            base_url: normalize_base_url(&config.base_url),
            client: build_client(config.request_timeout())?,
            timeout: config.request_timeout(),
            retry: RetryPolicy::with_retries(config.max_retries),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(&self, err: reqwest::Error) -> SwarmError {
        if err.is_timeout() {
            SwarmError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else if err.is_decode() {
            SwarmError::Stream(err.to_string())
        } else {
            SwarmError::Network(err)
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Serialize a request into the chat-completions wire format.
    pub fn build_request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), request.model.clone().into());
        body.insert("messages".into(), messages.into());
        body.insert("stream".into(), stream.into());
        if stream {
            body.insert("stream_options".into(), json!({"include_usage": true}));
        }

        if !request.tools.is_empty() {
            let tool_defs: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), tool_defs.into());
            if let Some(ref choice) = request.tool_choice {
                body.insert("tool_choice".into(), tool_choice_to_openai(choice));
            }
            body.insert(
                "parallel_tool_calls".into(),
                request.parallel_tool_calls.into(),
            );
        }

        Value::Object(body)
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, SwarmError> {
        let resp = self
            .client
            .post(self.endpoint())
            .headers(bearer_headers(&self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &headers, &body_text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Gateway for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SwarmError> {
        let body = self.build_request_body(request, false);
        debug!(model = %request.model, "OpenAI complete");

        let data: OpenAiChatResponse = self
            .retry
            .execute(|| {
                let body = &body;
                async move {
                    let resp = self.post(body).await?;
                    resp.json().await.map_err(|e| self.transport_error(e))
                }
            })
            .await?;

        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SwarmError::api(200, "No choices in OpenAI response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, parse_argument_text(&tc.function.arguments)))
            .collect();

        Ok(CompletionResponse {
            message: Message::assistant_tool_calls(
                choice.message.content.unwrap_or_default(),
                tool_calls,
            ),
            usage: data.usage.map(Usage::from).unwrap_or_default(),
            finish_reason: choice
                .finish_reason
                .as_deref()
                .and_then(FinishReason::from_provider),
        })
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk, SwarmError>>, SwarmError> {
        let body = self.build_request_body(request, true);
        debug!(model = %request.model, "OpenAI stream");

        let resp = self.retry.execute(|| self.post(&body)).await?;
        let byte_stream = resp.bytes_stream().fuse();

        let stream = async_stream::stream! {
            let mut lines = SseLineBuffer::new();
            let mut finish_reason = None;
            let mut usage = None;
            futures::pin_mut!(byte_stream);

            loop {
                let line = match lines.next_line() {
                    Some(line) => line,
                    None => match byte_stream.next().await {
                        Some(Ok(chunk)) => {
                            lines.push(&chunk);
                            continue;
                        }
                        Some(Err(e)) => {
                            yield Err(SwarmError::Network(e));
                            return;
                        }
                        None => match lines.finish() {
                            Some(tail) => tail,
                            None => break,
                        },
                    },
                };
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                match decode_stream_line(&line, &mut finish_reason, &mut usage) {
                    StreamLine::Done => break,
                    StreamLine::Chunks(chunks) => {
                        for chunk in chunks {
                            yield Ok(chunk);
                        }
                    }
                }
            }

            yield Ok(StreamChunk::Done { finish_reason, usage });
        };

        Ok(Box::pin(stream))
    }
}

enum StreamLine {
    Chunks(Vec<StreamChunk>),
    Done,
}

/// Turn one SSE line into chunks, recording usage and finish reason as they
/// appear.
fn decode_stream_line(
    line: &str,
    finish_reason: &mut Option<FinishReason>,
    usage: &mut Option<Usage>,
) -> StreamLine {
    let data = match parse_sse_line(line) {
        SseLine::Skip => return StreamLine::Chunks(Vec::new()),
        SseLine::Done => return StreamLine::Done,
        SseLine::Data(data) => data,
    };
    let parsed = match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "skipping unparseable stream chunk");
            return StreamLine::Chunks(Vec::new());
        }
    };
    if let Some(u) = parsed.usage {
        *usage = Some(Usage::from(u));
    }
    let Some(choice) = parsed.choices.into_iter().next() else {
        return StreamLine::Chunks(Vec::new());
    };

    let mut chunks = Vec::new();
    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
        chunks.push(StreamChunk::Content { text });
    }
    for tc in choice.delta.tool_calls.unwrap_or_default() {
        let function = tc.function.unwrap_or_default();
        chunks.push(StreamChunk::ToolCall {
            index: tc.index,
            id: tc.id,
            name: function.name,
            arguments: function.arguments.unwrap_or_default(),
        });
    }
    if let Some(reason) = choice.finish_reason.as_deref() {
        *finish_reason = FinishReason::from_provider(reason);
    }
    StreamLine::Chunks(chunks)
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn tool_choice_to_openai(choice: &str) -> Value {
    match choice {
        "auto" | "none" | "required" => Value::String(choice.to_string()),
        name => json!({"type": "function", "function": {"name": name}}),
    }
}

fn message_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": msg.content,
        }),
        Role::Assistant if msg.has_tool_calls() => {
            let tool_calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    let arguments = match &tc.arguments {
                        Value::String(raw) => raw.clone(),
                        other => other.to_string(),
                    };
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": { "name": tc.name, "arguments": arguments },
                    })
                })
                .collect();
            json!({
                "role": "assistant",
                "content": if msg.content.is_empty() { Value::Null } else { Value::String(msg.content.clone()) },
                "tool_calls": tool_calls,
            })
        }
        role => json!({ "role": role.to_string(), "content": msg.content }),
    }
}

// OpenAI API wire types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<OpenAiUsage> for Usage {
    fn from(u: OpenAiUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiStreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
