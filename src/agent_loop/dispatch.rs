//! Executes the tool calls of one turn and folds their results.

use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::agent::Agent;
use crate::tools::{FunctionRegistry, FunctionResult, ToolArguments, ToolContext};
use crate::types::{ContextVariables, Message, ToolCall};
use crate::util::panic_message;

/// Folded effect of one turn's tool calls.
#[derive(Debug, Default)]
pub(crate) struct DispatchOutcome {
    /// One reply per call, in request order.
    pub replies: Vec<Message>,
    pub context_updates: ContextVariables,
    /// Last agent returned in request order.
    pub handoff: Option<Agent>,
}

/// Run `calls` against `registry`.
///
/// Every call sees the same context snapshot. Results are folded in request
/// order whether the calls ran one after another or concurrently.
pub(crate) async fn dispatch_tool_calls(
    registry: &FunctionRegistry,
    calls: &[ToolCall],
    snapshot: &ContextVariables,
    concurrent: bool,
) -> DispatchOutcome {
    let results = if concurrent {
        join_all(calls.iter().map(|call| invoke(registry, call, snapshot))).await
    } else {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(invoke(registry, call, snapshot).await);
        }
        results
    };

    let mut outcome = DispatchOutcome::default();
    for (call, result) in calls.iter().zip(results) {
        outcome
            .replies
            .push(Message::tool_reply(&call.id, &call.name, result.value));
        outcome.context_updates.merge(&result.context_variables);
        if let Some(agent) = result.agent {
            outcome.handoff = Some(agent);
        }
    }
    outcome
}

/// Execute one call. Never fails: every fault becomes the reply text.
async fn invoke(
    registry: &FunctionRegistry,
    call: &ToolCall,
    snapshot: &ContextVariables,
) -> FunctionResult {
    let Some(tool) = registry.resolve(&call.name) else {
        tracing::warn!(tool = %call.name, call_id = %call.id, "tool not found");
        return FunctionResult::new(format!("Error: Tool {} not found.", call.name));
    };

    let args = ToolArguments::new(call.arguments.clone());
    let ctx = ToolContext {
        context_variables: snapshot.clone(),
        tool_call_id: call.id.clone(),
        tool_name: call.name.clone(),
    };

    match AssertUnwindSafe(tool.execute(&args, &ctx)).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            tracing::warn!(tool = %call.name, call_id = %call.id, error = %err, "tool failed");
            FunctionResult::new(format!("Error: {err}"))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(tool = %call.name, call_id = %call.id, panic = %message, "tool panicked");
            FunctionResult::new(format!("Error: tool {} panicked: {message}", call.name))
        }
    }
}
