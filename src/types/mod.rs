//! Core types for swarmkit.

pub mod context;
pub mod message;
pub mod stream;

pub use context::ContextVariables;
pub use message::{Message, Role, ToolCall};
pub use stream::{FinishReason, StreamChunk, Usage};
