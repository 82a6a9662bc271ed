//! Runs several independent agent conversations concurrently.
//!
//! Each run is its own task with its own cancellation token, a child of the
//! caller's token. Results flow through a single channel to the consumer; a
//! run's failure, panic or timeout lands in its own slot and never affects
//! its siblings.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::agent_loop::{Response, RunConfig, StreamHandler, Swarm};
use crate::error::SwarmError;
use crate::types::{ContextVariables, Message};
use crate::util::panic_message;

/// Input for one keyed run.
#[derive(Clone)]
pub struct AgentRun {
    pub agent: Agent,
    pub messages: Vec<Message>,
    pub context_variables: ContextVariables,
    pub config: RunConfig,
    /// When set, the run streams through this handler.
    pub handler: Option<Arc<dyn StreamHandler>>,
}

impl AgentRun {
    pub fn new(agent: Agent, messages: Vec<Message>) -> Self {
        Self {
            agent,
            messages,
            context_variables: ContextVariables::default(),
            config: RunConfig::default(),
            handler: None,
        }
    }

    pub fn with_context(mut self, context_variables: ContextVariables) -> Self {
        self.context_variables = context_variables;
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn StreamHandler>) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl std::fmt::Debug for AgentRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRun")
            .field("agent", &self.agent.name)
            .field("messages", &self.messages.len())
            .field("config", &self.config)
            .field("streaming", &self.handler.is_some())
            .finish()
    }
}

/// Outcome of one keyed run. Exactly one of `response` / `error` is set.
#[derive(Debug)]
pub struct ConcurrentRunResult {
    pub key: String,
    pub agent_name: String,
    pub response: Option<Response>,
    pub error: Option<SwarmError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ConcurrentRunResult {
    fn new(
        key: String,
        agent_name: String,
        started_at: DateTime<Utc>,
        result: Result<Response, SwarmError>,
    ) -> Self {
        let (response, error) = match result {
            Ok(response) => (Some(response), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            key,
            agent_name,
            response,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.response.is_some()
    }

    pub fn into_result(self) -> Result<Response, SwarmError> {
        match (self.response, self.error) {
            (Some(response), _) => Ok(response),
            (None, Some(error)) => Err(error),
            (None, None) => Err(SwarmError::Join(format!("run '{}' produced no result", self.key))),
        }
    }
}

/// Fans keyed runs out over a [`Swarm`] under one deadline.
#[derive(Debug, Clone)]
pub struct Coordinator {
    swarm: Swarm,
    deadline: Option<Duration>,
}

impl Coordinator {
    pub fn new(swarm: Swarm) -> Self {
        Self {
            swarm,
            deadline: None,
        }
    }

    /// Cancel every run still in flight once `deadline` has elapsed.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Wait for every run. One entry per key, ordered by key.
    pub async fn run_all<K, I>(
        &self,
        cancel: &CancellationToken,
        runs: I,
    ) -> BTreeMap<String, ConcurrentRunResult>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, AgentRun)>,
    {
        let mut stream = self.run_as_completed(cancel, runs);
        let mut results = BTreeMap::new();
        while let Some(result) = stream.next().await {
            results.insert(result.key.clone(), result);
        }
        results
    }

    /// Start every run now and yield results as they finish.
    ///
    /// Must be called inside a tokio runtime. Runs keep going if the stream
    /// is dropped; their results are discarded.
    pub fn run_as_completed<K, I>(
        &self,
        cancel: &CancellationToken,
        runs: I,
    ) -> ReceiverStream<ConcurrentRunResult>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, AgentRun)>,
    {
        let runs: BTreeMap<String, AgentRun> =
            runs.into_iter().map(|(k, run)| (k.into(), run)).collect();
        let (tx, rx) = mpsc::channel(runs.len().max(1));

        let parent = cancel.clone();
        let group = cancel.child_token();
        let deadline_hit = Arc::new(AtomicBool::new(false));
        if let Some(deadline) = self.deadline {
            spawn_deadline_timer(deadline, group.clone(), Arc::clone(&deadline_hit));
        }

        let swarm = self.swarm.clone();
        let deadline = self.deadline;
        tokio::spawn(async move {
            let _group_guard = group.clone().drop_guard();
            let mut pending: BTreeMap<String, String> = BTreeMap::new();
            let mut set = JoinSet::new();

            for (key, run) in runs {
                pending.insert(key.clone(), run.agent.name.clone());
                let swarm = swarm.clone();
                let tx = tx.clone();
                let run_cancel = group.child_token();
                let parent = parent.clone();
                let deadline_hit = Arc::clone(&deadline_hit);
                set.spawn(async move {
                    let started_at = Utc::now();
                    let agent_name = run.agent.name.clone();
                    let outcome = AssertUnwindSafe(execute(&swarm, &run_cancel, run))
                        .catch_unwind()
                        .await;
                    let result = match outcome {
                        Ok(Err(err)) if err.is_cancellation() => {
                            Err(classify_cancellation(&parent, &deadline_hit, deadline, err))
                        }
                        Ok(result) => result,
                        Err(payload) => {
                            let message = panic_message(payload.as_ref());
                            tracing::warn!(key = %key, agent = %agent_name, panic = %message, "concurrent run panicked");
                            Err(SwarmError::Join(format!("run '{key}' panicked: {message}")))
                        }
                    };
                    if let Err(ref err) = result {
                        tracing::debug!(key = %key, agent = %agent_name, error = %err, "concurrent run failed");
                    }
                    let _ = tx
                        .send(ConcurrentRunResult::new(key.clone(), agent_name, started_at, result))
                        .await;
                    key
                });
            }

            let mut reported = BTreeSet::new();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(key) => {
                        reported.insert(key);
                    }
                    Err(err) => tracing::warn!(error = %err, "concurrent run task failed"),
                }
            }

            // A task that died before sending still owes its key a result.
            for (key, agent_name) in pending {
                if reported.contains(&key) {
                    continue;
                }
                let now = Utc::now();
                let error = SwarmError::Join(format!("run '{key}' task failed"));
                let _ = tx
                    .send(ConcurrentRunResult::new(key, agent_name, now, Err(error)))
                    .await;
            }
        });

        ReceiverStream::new(rx)
    }
}

async fn execute(
    swarm: &Swarm,
    cancel: &CancellationToken,
    run: AgentRun,
) -> Result<Response, SwarmError> {
    let AgentRun {
        agent,
        messages,
        context_variables,
        config,
        handler,
    } = run;
    match handler {
        Some(handler) => {
            swarm
                .run_streaming(cancel, agent, messages, context_variables, config, handler.as_ref())
                .await
        }
        None => {
            swarm
                .run(cancel, agent, messages, context_variables, config)
                .await
        }
    }
}

fn spawn_deadline_timer(deadline: Duration, group: CancellationToken, hit: Arc<AtomicBool>) {
    tokio::spawn(async move {
        tokio::select! {
            _ = group.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {
                hit.store(true, Ordering::SeqCst);
                group.cancel();
            }
        }
    });
}

/// Parent cancellation wins over the deadline.
fn classify_cancellation(
    parent: &CancellationToken,
    deadline_hit: &AtomicBool,
    deadline: Option<Duration>,
    err: SwarmError,
) -> SwarmError {
    if parent.is_cancelled() {
        return SwarmError::Canceled;
    }
    match deadline {
        Some(deadline) if deadline_hit.load(Ordering::SeqCst) => SwarmError::DeadlineExceeded {
            after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        },
        _ => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_cancellation_outranks_deadline() {
        let parent = CancellationToken::new();
        let hit = AtomicBool::new(true);
        let deadline = Some(Duration::from_millis(10));
        let err = classify_cancellation(&parent, &hit, deadline, SwarmError::Canceled);
        assert!(matches!(err, SwarmError::DeadlineExceeded { after_ms: 10 }));

        parent.cancel();
        let err = classify_cancellation(&parent, &hit, deadline, SwarmError::Canceled);
        assert!(matches!(err, SwarmError::Canceled));
    }

    #[test]
    fn oversized_deadline_saturates_instead_of_wrapping() {
        let hit = AtomicBool::new(true);
        let err = classify_cancellation(
            &CancellationToken::new(),
            &hit,
            Some(Duration::MAX),
            SwarmError::Canceled,
        );
        assert!(matches!(err, SwarmError::DeadlineExceeded { after_ms: u64::MAX }));
    }

    #[test]
    fn result_slots_are_exclusive() {
        let now = Utc::now();
        let failed = ConcurrentRunResult::new("k".into(), "a".into(), now, Err(SwarmError::Canceled));
        assert!(!failed.is_ok());
        assert!(failed.response.is_none());
        assert!(matches!(failed.into_result(), Err(SwarmError::Canceled)));
    }
}
