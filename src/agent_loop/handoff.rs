//! The active-agent cell. Only the turn loop reassigns it.

use crate::agent::Agent;

/// What applying a tool result's agent did to the active agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// No agent was returned.
    Stayed,
    /// The returned agent has the active agent's name; nothing changes.
    SelfHandoff,
    Switched { from: String, to: String },
}

impl Transition {
    pub fn is_switch(&self) -> bool {
        matches!(self, Self::Switched { .. })
    }
}

/// Holds the agent whose instructions, model and tools drive the next turn.
#[derive(Debug, Clone)]
pub struct ActiveAgent {
    current: Agent,
}

impl ActiveAgent {
    pub fn new(agent: Agent) -> Self {
        Self { current: agent }
    }

    pub fn current(&self) -> &Agent {
        &self.current
    }

    pub fn name(&self) -> &str {
        &self.current.name
    }

    /// Switch to `next` when it names a different agent.
    pub fn apply(&mut self, next: Option<Agent>) -> Transition {
        match next {
            None => Transition::Stayed,
            Some(agent) if agent.name == self.current.name => Transition::SelfHandoff,
            Some(agent) => {
                let from = std::mem::replace(&mut self.current, agent);
                Transition::Switched {
                    from: from.name,
                    to: self.current.name.clone(),
                }
            }
        }
    }

    pub fn into_inner(self) -> Agent {
        self.current
    }
}
