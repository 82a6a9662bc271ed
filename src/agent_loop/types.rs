//! Core run types for the turn loop.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::agent::Agent;
use crate::error::SwarmError;
use crate::types::{ContextVariables, Message, Usage};

/// Unique run identifier.
pub type RunId = Uuid;

/// Per-call options for [`Swarm::run`](super::Swarm::run).
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct RunConfig {
    /// Upper bound on gateway invocations. Must be at least 1.
    #[builder(default = usize::MAX)]
    pub max_turns: usize,
    /// When false, tool calls are returned to the caller unexecuted.
    #[builder(default = true)]
    pub execute_tools: bool,
    /// Model used instead of the active agent's model.
    #[builder(into)]
    pub model_override: Option<String>,
    /// Drive the gateway through its streaming call.
    #[builder(default)]
    pub stream: bool,
    #[builder(default)]
    pub debug: bool,
    /// Execute the tool calls of one turn concurrently.
    #[builder(default)]
    pub concurrent_tools: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), SwarmError> {
        if self.max_turns == 0 {
            return Err(SwarmError::Configuration(
                "max_turns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunOutcome {
    /// The model answered without requesting tools.
    Completed,
    /// The model requested tools and `execute_tools` was off.
    ToolCallsReturned,
    /// `max_turns` gateway calls were made.
    MaxTurnsReached,
}

/// Result of one top-level run.
#[derive(Debug, Clone)]
pub struct Response {
    pub run_id: RunId,
    /// Messages appended during this run, caller history excluded.
    pub messages: Vec<Message>,
    /// The agent active when the run ended.
    pub agent: Agent,
    pub context_variables: ContextVariables,
    /// Gateway invocations performed.
    pub turns: usize,
    pub outcome: RunOutcome,
    pub usage: Usage,
}

impl Response {
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Content of the last message, empty when there is none.
    pub fn final_content(&self) -> &str {
        self.last_message().map(|m| m.content.as_str()).unwrap_or("")
    }
}
