//! Turn loop primitives (runs, handoffs, streaming callbacks).

mod dispatch;
pub mod events;
pub mod handoff;
mod relay;
pub mod runner;
pub mod types;

pub use events::*;
pub use handoff::{ActiveAgent, Transition};
pub use runner::Swarm;
pub use types::*;
