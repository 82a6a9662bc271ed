//! What a tool hands back to the turn loop.

use serde_json::{json, Value};

use crate::agent::Agent;
use crate::types::ContextVariables;

/// Outcome of one tool invocation.
///
/// `value` becomes the tool reply content. `agent`, when set, is the handoff
/// target for subsequent turns. `context_variables` are merged into the run.
#[derive(Debug, Clone, Default)]
pub struct FunctionResult {
    pub value: String,
    pub agent: Option<Agent>,
    pub context_variables: ContextVariables,
}

impl FunctionResult {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Hand the conversation to `agent`.
    pub fn handoff(agent: Agent) -> Self {
        agent.into()
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_context(mut self, context_variables: ContextVariables) -> Self {
        self.context_variables = context_variables;
        self
    }

    /// Add a single context update.
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context_variables.insert(key, value);
        self
    }
}

impl From<String> for FunctionResult {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for FunctionResult {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Agent> for FunctionResult {
    fn from(agent: Agent) -> Self {
        Self {
            value: json!({ "assistant": agent.name }).to_string(),
            agent: Some(agent),
            context_variables: ContextVariables::default(),
        }
    }
}

impl From<Value> for FunctionResult {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::new(text),
            Value::Null => Self::new(""),
            other => Self::new(other.to_string()),
        }
    }
}

impl From<()> for FunctionResult {
    fn from(_: ()) -> Self {
        Self::default()
    }
}
