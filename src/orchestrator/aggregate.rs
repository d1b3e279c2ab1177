//! Chunk aggregation for one streamed turn, and totals across turns.

use super::collect::ToolSet;
use super::dispatch::DispatchedCall;
use crate::types::{
    AggregatedResponse, FinishReason, ModelChunk, ModelResponse, ReasoningAggregate, Termination,
    ToolCall, ToolCallEvent, ToolResult, Usage,
};

#[derive(Debug)]
struct OpenCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds the chunks of one streamed model call into a [`ModelResponse`].
///
/// Tool calls are buffered by id from `start` until `end`; calls that never
/// see `end` are closed in start order by [`TurnAggregator::close_open`].
#[derive(Debug, Default)]
pub struct TurnAggregator {
    content: String,
    reasoning: ReasoningAggregate,
    open: Vec<OpenCall>,
    completed: Vec<ToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

impl TurnAggregator {
    /// Absorb one chunk. Returns the call completed by an `end` event.
    pub fn push(&mut self, chunk: &ModelChunk) -> Option<ToolCall> {
        match chunk {
            ModelChunk::Content { text } => self.content.push_str(text),
            ModelChunk::Reasoning(delta) => self.reasoning.push(delta),
            ModelChunk::ToolCall(event) => return self.push_tool_event(event),
            ModelChunk::Finish { reason, usage } => {
                if reason.is_some() {
                    self.finish_reason = *reason;
                }
                if let Some(usage) = usage {
                    self.usage = Some(usage.clone());
                }
            }
        }
        None
    }

    fn push_tool_event(&mut self, event: &ToolCallEvent) -> Option<ToolCall> {
        match event {
            ToolCallEvent::Start { id, name } => {
                if self.open.iter().any(|c| &c.id == id) || self.completed.iter().any(|c| &c.id == id) {
                    tracing::debug!(id, "duplicate tool call start ignored");
                    return None;
                }
                self.open.push(OpenCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: String::new(),
                });
                None
            }
            ToolCallEvent::ArgumentsDelta { id, delta } => {
                match self.open.iter_mut().find(|c| &c.id == id) {
                    Some(call) => call.arguments.push_str(delta),
                    None => tracing::debug!(id, "arguments for unknown tool call ignored"),
                }
                None
            }
            ToolCallEvent::End { id } => {
                let pos = self.open.iter().position(|c| &c.id == id)?;
                let call = finish_call(self.open.remove(pos));
                self.completed.push(call.clone());
                Some(call)
            }
        }
    }

    /// Close calls still open when the model stream ended, in start order.
    pub fn close_open(&mut self) -> Vec<ToolCall> {
        let closed: Vec<ToolCall> = self.open.drain(..).map(finish_call).collect();
        self.completed.extend(closed.iter().cloned());
        closed
    }

    pub fn into_response(mut self) -> ModelResponse {
        self.close_open();
        ModelResponse {
            content: self.content,
            reasoning: (!self.reasoning.is_empty()).then_some(self.reasoning),
            tool_calls: self.completed,
            finish_reason: self.finish_reason,
            usage: self.usage.unwrap_or_default(),
        }
    }
}

/// Arguments that are not valid JSON are kept as the raw string.
fn finish_call(open: OpenCall) -> ToolCall {
    let arguments = if open.arguments.trim().is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(&open.arguments)
            .unwrap_or(serde_json::Value::String(open.arguments))
    };
    ToolCall {
        id: open.id,
        name: open.name,
        arguments,
    }
}

/// Totals across every turn of one orchestration call.
#[derive(Debug, Default)]
pub struct ResponseAggregate {
    content: String,
    reasoning: ReasoningAggregate,
    tool_calls: Vec<ToolCall>,
    tool_results: Vec<ToolResult>,
    usage: Usage,
    finish_reason: Option<FinishReason>,
}

impl ResponseAggregate {
    pub fn absorb_turn(&mut self, response: &ModelResponse) {
        self.content.push_str(&response.content);
        if let Some(reasoning) = &response.reasoning {
            self.reasoning.merge(reasoning);
        }
        self.usage.merge(&response.usage);
        self.finish_reason = response.finish_reason;
    }

    /// Record executed calls under the names the caller used.
    pub fn record_dispatch(&mut self, outcomes: &[DispatchedCall], tools: &ToolSet) {
        for outcome in outcomes.iter().filter(|o| o.within_budget) {
            let mut call = outcome.call.clone();
            call.name = tools.original_name(&call.name).to_string();
            self.tool_calls.push(call);
            self.tool_results.push(outcome.result.clone());
        }
    }

    pub fn finish(
        self,
        termination: Termination,
        provider: String,
        model: String,
        iterations: u32,
    ) -> AggregatedResponse {
        AggregatedResponse {
            content: self.content,
            reasoning: (!self.reasoning.is_empty()).then_some(self.reasoning),
            tool_calls: self.tool_calls,
            tool_results: self.tool_results,
            usage: self.usage,
            finish_reason: self.finish_reason,
            termination,
            provider,
            model,
            iterations,
        }
    }
}
