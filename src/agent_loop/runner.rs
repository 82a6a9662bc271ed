//! The turn loop: drives agents against a gateway until they finish.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::{is_truthy, SwarmConfig};
use crate::coordinator::{AgentRun, ConcurrentRunResult, Coordinator};
use crate::error::SwarmError;
use crate::gateway::{CompletionRequest, CompletionResponse, Gateway};
use crate::tools::FunctionRegistry;
use crate::types::{ContextVariables, Message, Role, Usage};

use super::dispatch::dispatch_tool_calls;
use super::events::{NoopStreamHandler, StreamHandler};
use super::handoff::{ActiveAgent, Transition};
use super::relay::relay_stream;
use super::types::{Response, RunConfig, RunOutcome};

/// Entry point for running agents.
///
/// Stateless between calls: every run owns its history and context map.
/// Cloning is cheap and clones share the gateway.
#[derive(Clone)]
pub struct Swarm {
    gateway: Arc<dyn Gateway>,
    config: SwarmConfig,
}

impl Swarm {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_config(gateway, SwarmConfig::default())
    }

    pub fn with_config(gateway: Arc<dyn Gateway>, config: SwarmConfig) -> Self {
        Self { gateway, config }
    }

    /// Build a swarm backed by the OpenAI gateway.
    #[cfg(feature = "openai")]
    pub fn from_config(config: SwarmConfig) -> Result<Self, SwarmError> {
        let gateway = crate::gateway::OpenAiGateway::from_config(&config)?;
        Ok(Self::with_config(Arc::new(gateway), config))
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Run `agent` over `messages` until it answers without tools, returns
    /// tool calls unexecuted, or exhausts `max_turns`.
    ///
    /// With `config.stream` set the gateway's streaming call is used and the
    /// output discarded; use [`Swarm::run_streaming`] to observe it.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        agent: Agent,
        messages: Vec<Message>,
        context_variables: ContextVariables,
        config: RunConfig,
    ) -> Result<Response, SwarmError> {
        let handler = config
            .stream
            .then_some(&NoopStreamHandler as &dyn StreamHandler);
        self.drive(cancel, agent, messages, context_variables, &config, handler)
            .await
    }

    /// Like [`Swarm::run`], streaming every gateway call through `handler`.
    pub async fn run_streaming(
        &self,
        cancel: &CancellationToken,
        agent: Agent,
        messages: Vec<Message>,
        context_variables: ContextVariables,
        config: RunConfig,
        handler: &dyn StreamHandler,
    ) -> Result<Response, SwarmError> {
        self.drive(cancel, agent, messages, context_variables, &config, Some(handler))
            .await
    }

    /// Run several agents concurrently, waiting for all of them.
    pub async fn run_concurrent(
        &self,
        cancel: &CancellationToken,
        runs: BTreeMap<String, AgentRun>,
        deadline: Option<Duration>,
    ) -> BTreeMap<String, ConcurrentRunResult> {
        let mut coordinator = Coordinator::new(self.clone());
        if let Some(deadline) = deadline {
            coordinator = coordinator.with_deadline(deadline);
        }
        coordinator.run_all(cancel, runs).await
    }

    async fn drive(
        &self,
        cancel: &CancellationToken,
        agent: Agent,
        messages: Vec<Message>,
        context_variables: ContextVariables,
        config: &RunConfig,
        handler: Option<&dyn StreamHandler>,
    ) -> Result<Response, SwarmError> {
        let run_id = Uuid::new_v4();
        let debug = config.debug || self.config.debug || debug_enabled();

        config.validate()?;
        let mut registry = prepare(&agent)?;
        self.resolve_model(config, &agent)?;

        let mut active = ActiveAgent::new(agent);
        let mut history = messages;
        let history_start = history.len();
        let mut context_variables = context_variables;
        let mut usage = Usage::default();
        let mut turns = 0usize;

        if debug {
            tracing::debug!(
                %run_id,
                agent = active.name(),
                max_turns = config.max_turns,
                streaming = handler.is_some(),
                "swarm run start"
            );
        }

        let outcome = loop {
            if turns >= config.max_turns {
                break RunOutcome::MaxTurnsReached;
            }
            if cancel.is_cancelled() {
                return Err(SwarmError::Canceled);
            }

            let agent = active.current();
            let instructions = agent.instructions.resolve(&context_variables, &agent.name)?;
            let request = CompletionRequest {
                model: self.resolve_model(config, agent)?,
                messages: request_messages(instructions, &history),
                tools: registry.definitions(),
                tool_choice: agent.tool_choice.clone(),
                parallel_tool_calls: agent.parallel_tool_calls,
            };

            if debug {
                tracing::debug!(
                    %run_id,
                    turn = turns + 1,
                    agent = %agent.name,
                    model = %request.model,
                    tools = ?registry.names(),
                    "calling gateway"
                );
            }

            let response = match handler {
                Some(handler) if agent.streaming => {
                    relay_stream(self.gateway.as_ref(), &request, handler, cancel, &agent.name)
                        .await?
                }
                _ => self.complete(&request, cancel).await?,
            };
            turns += 1;
            usage.add(&response.usage);

            let message = response.message.with_sender(agent.name.clone());
            let has_tool_calls = message.has_tool_calls();
            history.push(message);

            if !has_tool_calls {
                break RunOutcome::Completed;
            }
            if !config.execute_tools {
                break RunOutcome::ToolCallsReturned;
            }

            let calls = history
                .last()
                .map(|m| m.tool_calls.clone())
                .unwrap_or_default();
            if debug {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                tracing::debug!(%run_id, turn = turns, tools = ?names, "dispatching tool calls");
            }

            let dispatched =
                dispatch_tool_calls(&registry, &calls, &context_variables, config.concurrent_tools)
                    .await;
            context_variables.merge(&dispatched.context_updates);
            history.extend(dispatched.replies);

            match active.apply(dispatched.handoff) {
                Transition::Switched { from, to } => {
                    if debug {
                        tracing::debug!(%run_id, %from, %to, "handoff");
                    }
                    registry = prepare(active.current())?;
                }
                Transition::SelfHandoff if debug => {
                    tracing::debug!(%run_id, agent = active.name(), "self handoff ignored");
                }
                _ => {}
            }
        };

        if debug {
            tracing::debug!(%run_id, turns, %outcome, agent = active.name(), "swarm run finished");
        }

        Ok(Response {
            run_id,
            messages: history.split_off(history_start),
            agent: active.into_inner(),
            context_variables,
            turns,
            outcome,
            usage,
        })
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse, SwarmError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SwarmError::Canceled),
            response = self.gateway.complete(request) => response,
        }
    }

    fn resolve_model(&self, config: &RunConfig, agent: &Agent) -> Result<String, SwarmError> {
        [
            config.model_override.as_deref(),
            Some(agent.model.as_str()),
            self.config.default_model.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|model| !model.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            SwarmError::Configuration(format!("agent '{}' has no model", agent.name))
        })
    }
}

impl std::fmt::Debug for Swarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swarm")
            .field("gateway", &self.gateway.name())
            .field("config", &self.config)
            .finish()
    }
}

fn prepare(agent: &Agent) -> Result<FunctionRegistry, SwarmError> {
    agent.validate()?;
    agent.registry()
}

/// `[system(instructions)] + history`, dropping any leading system messages of
/// the history from the request only.
fn request_messages(instructions: String, history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(instructions));
    messages.extend(
        history
            .iter()
            .skip_while(|m| m.role == Role::System)
            .cloned(),
    );
    messages
}

fn debug_enabled() -> bool {
    std::env::var("SWARMKIT_DEBUG").is_ok_and(|v| is_truthy(&v))
}
