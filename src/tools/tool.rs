//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::result::FunctionResult;
use super::types::{ToolDefinition, ToolParameters};
use crate::error::SwarmError;
use crate::types::ContextVariables;

/// Context available during tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Snapshot of the run's context variables at dispatch time.
    pub context_variables: ContextVariables,
    /// Id of the tool call being answered.
    pub tool_call_id: String,
    pub tool_name: String,
}

/// A capability an agent can invoke. Implement to create custom tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &ToolParameters;

    /// Execute the tool. Errors become tool replies, they never abort a run.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<FunctionResult, SwarmError>;

    /// Declaration sent to the gateway.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

type ToolFuture = Pin<Box<dyn Future<Output = Result<FunctionResult, SwarmError>> + Send>>;

/// Boxed async handler behind a [`FunctionTool`].
pub type ToolHandler = dyn Fn(ToolArguments, ToolContext) -> ToolFuture + Send + Sync;

/// Closure-based tool.
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    /// Create a tool from an async closure.
    pub fn new<F, Fut, R>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, SwarmError>> + Send + 'static,
        R: Into<FunctionResult> + Send + 'static,
    {
        let boxed: Arc<ToolHandler> = Arc::new(move |args, ctx| -> ToolFuture {
            let fut = handler(args, ctx);
            Box::pin(async move { fut.await.map(Into::into) })
        });
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: boxed,
        }
    }

    /// Create a tool from a synchronous closure.
    pub fn from_fn<F, R>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(&ToolArguments, &ToolContext) -> Result<R, SwarmError> + Send + Sync + 'static,
        R: Into<FunctionResult> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(name, description, parameters, move |args, ctx| {
            let handler = Arc::clone(&handler);
            async move { handler(&args, &ctx) }
        })
    }

    /// Wrap into a shared trait object, the form agents hold.
    pub fn shared(self) -> Arc<dyn Tool> {
        Arc::new(self)
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<FunctionResult, SwarmError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn closure_tool_receives_arguments_and_context() {
        let tool = FunctionTool::new(
            "greet",
            "Greets a user",
            ToolParameters::object().string("name", "Who", true).build(),
            |args: ToolArguments, ctx: ToolContext| async move {
                let name: String = args.get("name")?;
                let greeting = ctx.context_variables.get_str("greeting").unwrap_or("Hi");
                Ok::<_, SwarmError>(format!("{greeting}, {name}"))
            },
        );
        let ctx = ToolContext {
            context_variables: ContextVariables::new().with("greeting", "Hello"),
            tool_call_id: "call-1".into(),
            tool_name: "greet".into(),
        };
        let result = tool
            .execute(&ToolArguments::new(json!({"name": "Ada"})), &ctx)
            .await
            .expect("execute");
        assert_eq!(result.value, "Hello, Ada");
        assert!(result.agent.is_none());
    }

    #[test]
    fn definition_carries_schema() {
        let tool = FunctionTool::from_fn("noop", "Does nothing", ToolParameters::empty(), |_, _| {
            Ok("")
        });
        let def = tool.definition();
        assert_eq!(def.name, "noop");
        assert_eq!(def.parameters["type"], "object");
    }
}
