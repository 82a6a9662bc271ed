//! Per-agent lookup from tool name to capability.

use std::collections::HashMap;
use std::sync::Arc;

use super::tool::Tool;
use super::types::ToolDefinition;
use crate::error::SwarmError;

/// Ordered, name-unique set of an agent's tools.
#[derive(Clone)]
pub struct FunctionRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl FunctionRegistry {
    /// Build the registry for `agent_name`, rejecting duplicate tool names.
    pub fn new(agent_name: &str, tools: &[Arc<dyn Tool>]) -> Result<Self, SwarmError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), position).is_some() {
                return Err(SwarmError::DuplicateTool {
                    agent: agent_name.to_string(),
                    tool_name: tool.name().to_string(),
                });
            }
        }
        Ok(Self {
            tools: tools.to_vec(),
            index,
        })
    }

    /// Look up a tool by the name the model used.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Declarations in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
