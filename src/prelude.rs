//! Convenience re-exports for common use.

pub use crate::agent::{Agent, Instructions};
pub use crate::agent_loop::{
    ChannelStreamHandler, FnStreamHandler, NoopStreamHandler, Response, RunConfig, RunOutcome,
    StreamEvent, StreamHandler, Swarm,
};
pub use crate::config::SwarmConfig;
pub use crate::coordinator::{AgentRun, ConcurrentRunResult, Coordinator};
pub use crate::error::{ErrorCategory, Result, SwarmError};
pub use crate::gateway::{CompletionRequest, CompletionResponse, Gateway};
pub use crate::tools::{
    FunctionResult, FunctionTool, Tool, ToolArguments, ToolContext, ToolParameters,
};
pub use crate::types::{ContextVariables, FinishReason, Message, Role, StreamChunk, ToolCall, Usage};

#[cfg(feature = "openai")]
pub use crate::gateway::OpenAiGateway;
