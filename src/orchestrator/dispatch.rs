//! Tool-call dispatch for one model turn.

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use super::collect::ToolSet;
use crate::error::SwitchyardError;
use crate::tools::{validate_arguments, ToolArguments, ToolCallBudget, ToolExecutionContext};
use crate::types::{ToolCall, ToolResult};

pub const BUDGET_EXHAUSTED: &str = "tool call budget exhausted";

/// Outcome of one requested call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedCall {
    pub call: ToolCall,
    pub result: ToolResult,
    /// False when the call was refused because the budget ran out.
    pub within_budget: bool,
}

/// Execute a batch of calls, returning outcomes in request order.
///
/// Budget is consumed per call in request order; calls past the remaining
/// budget are not run and receive an error result. Unknown tools, invalid
/// arguments and executor failures become error results too. Only
/// cancellation fails the batch.
pub async fn dispatch_batch(
    calls: &[ToolCall],
    tools: &ToolSet,
    budget: &mut ToolCallBudget,
    parallel: bool,
    metadata: &serde_json::Value,
    cancel: &CancellationToken,
) -> Result<Vec<DispatchedCall>, SwitchyardError> {
    let admitted = calls
        .iter()
        .map(|_| budget.consume(1))
        .collect::<Result<Vec<bool>, _>>()?;

    let run = async {
        if parallel {
            join_all(
                calls
                    .iter()
                    .zip(&admitted)
                    .map(|(call, &ok)| run_call(call, ok, tools, metadata, cancel)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for (call, &ok) in calls.iter().zip(&admitted) {
                results.push(run_call(call, ok, tools, metadata, cancel).await);
            }
            results
        }
    };

    let results = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SwitchyardError::ClientAborted),
        results = run => results,
    };

    Ok(calls
        .iter()
        .zip(admitted)
        .zip(results)
        .map(|((call, within_budget), result)| DispatchedCall {
            call: call.clone(),
            result,
            within_budget,
        })
        .collect())
}

async fn run_call(
    call: &ToolCall,
    within_budget: bool,
    tools: &ToolSet,
    metadata: &serde_json::Value,
    cancel: &CancellationToken,
) -> ToolResult {
    if !within_budget {
        return ToolResult::error(&call.id, BUDGET_EXHAUSTED);
    }
    let Some(entry) = tools.get(&call.name) else {
        tracing::debug!(tool = %call.name, id = %call.id, "model called an unknown tool");
        return ToolResult::error(&call.id, format!("unknown tool '{}'", call.name));
    };

    let args = match &call.arguments {
        serde_json::Value::String(raw) => ToolArguments::parse(raw),
        serde_json::Value::Null => Ok(ToolArguments::new(serde_json::json!({}))),
        other => Ok(ToolArguments::new(other.clone())),
    };
    let args = match args {
        Ok(args) => args,
        Err(e) => return ToolResult::error(&call.id, e.to_string()),
    };
    if let Err(message) = validate_arguments(args.raw(), &entry.definition.parameters) {
        return ToolResult::error(&call.id, format!("invalid arguments: {message}"));
    }

    let Some(executor) = &entry.executor else {
        return ToolResult::error(
            &call.id,
            format!("tool '{}' has no executor", entry.original),
        );
    };

    let ctx = ToolExecutionContext {
        tool_call_id: call.id.clone(),
        metadata: metadata.clone(),
        cancel: cancel.child_token(),
    };
    tracing::debug!(tool = %entry.original, id = %call.id, "executing tool");
    match executor.execute(&args, &ctx).await {
        Ok(value) => ToolResult::success(&call.id, value),
        Err(e) => {
            tracing::debug!(tool = %entry.original, error = %e, "tool failed");
            ToolResult::error(&call.id, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, Tool, ToolParameters};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    fn sleepy_tool_set() -> ToolSet {
        let tool = AgentTool::new(
            "sleep",
            "Sleep then echo",
            ToolParameters::object()
                .integer("ms", "Milliseconds", true)
                .build(),
            |args, _ctx| async move {
                let ms = args.get_i64("ms")?;
                tokio::time::sleep(Duration::from_millis(ms as u64)).await;
                Ok::<_, SwitchyardError>(json!(ms))
            },
        );
        let mut set = ToolSet::default();
        set.add(tool.definition(), Some(Arc::new(tool))).unwrap();
        set
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_results_keep_request_order() {
        let set = sleepy_tool_set();
        let calls = vec![
            call("a", "sleep", json!({"ms": 300})),
            call("b", "sleep", json!({"ms": 10})),
        ];
        let mut budget = ToolCallBudget::unbounded();
        let start = tokio::time::Instant::now();
        let out = dispatch_batch(
            &calls,
            &set,
            &mut budget,
            true,
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(out[0].result.tool_call_id, "a");
        assert_eq!(out[1].result.result, json!(10));
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn failures_become_error_results() {
        let set = sleepy_tool_set();
        let calls = vec![
            call("u", "missing", json!({})),
            call("v", "sleep", json!({"ms": "soon"})),
            call("w", "sleep", json!("{not json")),
        ];
        let mut budget = ToolCallBudget::unbounded();
        let out = dispatch_batch(
            &calls,
            &set,
            &mut budget,
            false,
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(out.iter().all(|d| d.result.is_error && d.within_budget));
        assert_eq!(budget.used(), 3);
    }

    #[tokio::test]
    async fn calls_past_budget_are_refused() {
        let set = sleepy_tool_set();
        let calls = vec![
            call("a", "sleep", json!({"ms": 0})),
            call("b", "sleep", json!({"ms": 0})),
        ];
        let mut budget = ToolCallBudget::limited(1);
        let out = dispatch_batch(
            &calls,
            &set,
            &mut budget,
            false,
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(!out[0].result.is_error);
        assert!(!out[1].within_budget);
        assert_eq!(out[1].result.result, json!({"error": BUDGET_EXHAUSTED}));
        assert!(budget.exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_the_batch() {
        let set = sleepy_tool_set();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });
        let err = dispatch_batch(
            &[call("a", "sleep", json!({"ms": 1000}))],
            &set,
            &mut ToolCallBudget::unbounded(),
            false,
            &json!({}),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SwitchyardError::ClientAborted));
    }
}
