//! Agent definition: a named persona with instructions, a model and tools.

use std::sync::Arc;

use super::instructions::Instructions;
use super::{DEFAULT_INSTRUCTIONS, DEFAULT_MODEL};
use crate::error::SwarmError;
use crate::tools::registry::FunctionRegistry;
use crate::tools::tool::Tool;

/// An agent participating in a run.
///
/// Cheap to clone. A handoff replaces the active agent with another value;
/// an agent is never mutated while a turn is in flight.
#[derive(Clone)]
pub struct Agent {
    pub name: String,
    pub model: String,
    pub instructions: Instructions,
    pub tools: Vec<Arc<dyn Tool>>,
    /// Forwarded to the gateway as-is.
    pub tool_choice: Option<String>,
    pub parallel_tool_calls: bool,
    /// When false the agent is always driven through the non-streaming call.
    pub streaming: bool,
}

impl Agent {
    /// Create an agent with default model and instructions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: DEFAULT_MODEL.to_string(),
            instructions: Instructions::Static(DEFAULT_INSTRUCTIONS.to_string()),
            tools: Vec::new(),
            tool_choice: None,
            parallel_tool_calls: true,
            streaming: true,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Add a tool.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: impl Into<String>) -> Self {
        self.tool_choice = Some(tool_choice.into());
        self
    }

    pub fn with_parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = enabled;
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    /// Build the tool registry, rejecting duplicate names.
    pub fn registry(&self) -> Result<FunctionRegistry, SwarmError> {
        FunctionRegistry::new(&self.name, &self.tools)
    }

    /// Check what can be checked without calling the gateway.
    pub fn validate(&self) -> Result<(), SwarmError> {
        if self.name.trim().is_empty() {
            return Err(SwarmError::Configuration(
                "agent name must not be empty".to_string(),
            ));
        }
        self.registry().map(|_| ())
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new("Agent")
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("instructions", &self.instructions)
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("tool_choice", &self.tool_choice)
            .field("parallel_tool_calls", &self.parallel_tool_calls)
            .field("streaming", &self.streaming)
            .finish()
    }
}
