//! Agents: named personas with instructions, a model and tools.

pub mod agent;
pub mod instructions;

pub use agent::Agent;
pub use instructions::{Instructions, InstructionsFn};

/// Model used when an agent does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Instructions used when an agent does not set any.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful agent.";
