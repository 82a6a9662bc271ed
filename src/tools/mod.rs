//! Tools agents can invoke, and the per-agent registry that dispatches them.

pub mod arguments;
pub mod registry;
pub mod result;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use registry::FunctionRegistry;
pub use result::FunctionResult;
pub use tool::{FunctionTool, Tool, ToolContext, ToolHandler};
pub use types::{ParameterBuilder, ToolDefinition, ToolParameters};
