//! Agent instructions, either fixed text or computed from context.

use std::fmt;
use std::sync::Arc;

use crate::error::SwarmError;
use crate::types::ContextVariables;

/// Closure that renders instructions from the current context variables.
pub type InstructionsFn =
    dyn Fn(&ContextVariables) -> Result<String, SwarmError> + Send + Sync;

/// The system prompt of an agent. Evaluated fresh before every gateway call.
#[derive(Clone)]
pub enum Instructions {
    Static(String),
    Computed(Arc<InstructionsFn>),
}

impl Instructions {
    /// Wrap a closure.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&ContextVariables) -> Result<String, SwarmError> + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Render the instructions for `agent_name`.
    ///
    /// Any failure from a computed variant is reported as
    /// [`SwarmError::Instructions`], whatever error the closure returned.
    pub fn resolve(
        &self,
        context_variables: &ContextVariables,
        agent_name: &str,
    ) -> Result<String, SwarmError> {
        match self {
            Self::Static(text) => Ok(text.clone()),
            Self::Computed(f) => f(context_variables).map_err(|err| match err {
                SwarmError::Instructions { .. } => err,
                other => SwarmError::Instructions {
                    agent: agent_name.to_string(),
                    message: other.to_string(),
                },
            }),
        }
    }
}

impl Default for Instructions {
    fn default() -> Self {
        Self::Static(super::DEFAULT_INSTRUCTIONS.to_string())
    }
}

impl From<String> for Instructions {
    fn from(text: String) -> Self {
        Self::Static(text)
    }
}

impl From<&str> for Instructions {
    fn from(text: &str) -> Self {
        Self::Static(text.to_string())
    }
}

impl fmt::Debug for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}
