//! swarmkit: multi-agent orchestration
//!
//! Runs conversational agents against a language-model completion service.
//! Agents call tools, hand the conversation to other agents, stream their
//! output through callbacks, and run side by side under a shared deadline.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use swarmkit::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> swarmkit::error::Result<()> {
//! let swarm = Swarm::from_config(SwarmConfig::load()?)?;
//!
//! let sales = Agent::new("Sales").with_instructions("Sell the user a bee.");
//! let to_sales = FunctionTool::from_fn(
//!     "transfer_to_sales",
//!     "Hand the user to the sales team",
//!     ToolParameters::empty(),
//!     move |_, _| Ok(sales.clone()),
//! );
//! let triage = Agent::new("Triage").with_tool(Arc::new(to_sales));
//!
//! let response = swarm
//!     .run(
//!         &CancellationToken::new(),
//!         triage,
//!         vec![Message::user("I want to buy a bee")],
//!         ContextVariables::new(),
//!         RunConfig::builder().max_turns(8).build(),
//!     )
//!     .await?;
//! println!("{}: {}", response.agent.name, response.final_content());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod prelude;
pub mod tools;
pub mod types;
pub mod util;
