//! Deterministic in-process backend for development and offline use.
//!
//! The reply is derived from the conversation:
//! - after tool results, it summarizes them;
//! - a user message `/call <tool> [json]` requests that tool when offered;
//! - otherwise it echoes the last user message.

use async_trait::async_trait;
use futures::stream;

use super::{ChunkStream, ModelProvider, ModelRequest};
use crate::error::SwitchyardError;
use crate::types::{ModelChunk, ModelResponse, Role, ToolCall, ToolCallEvent, Usage};

const EMBEDDING_DIMS: usize = 8;

/// Echo backend with no network access.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    name: String,
}

impl LocalProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn respond(&self, model: &str, request: &ModelRequest) -> ModelResponse {
        let input_tokens = request
            .messages
            .iter()
            .map(|m| word_count(&m.text()))
            .sum::<u32>();

        let last = request.messages.last();
        let mut response = match last {
            Some(msg) if msg.role == Role::Tool => {
                let results: Vec<String> = request
                    .messages
                    .iter()
                    .rev()
                    .take_while(|m| m.role == Role::Tool)
                    .flat_map(|m| m.tool_results().into_iter().map(|r| r.result.to_string()))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                ModelResponse::text(format!("[{model}] tool results: {}", results.join(", ")))
            }
            Some(msg) => match parse_call_directive(&msg.text(), request) {
                Some(call) => ModelResponse::tool_calls(vec![ToolCall {
                    id: format!("call_{}", request.messages.len()),
                    name: call.0,
                    arguments: call.1,
                }]),
                None => ModelResponse::text(format!("[{model}] {}", msg.text())),
            },
            None => ModelResponse::text(format!("[{model}]")),
        };

        let output_tokens = word_count(&response.content);
        response.usage = Usage {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            reasoning_tokens: None,
        };
        response
    }
}

fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

fn parse_call_directive(text: &str, request: &ModelRequest) -> Option<(String, serde_json::Value)> {
    let rest = text.trim().strip_prefix("/call ")?;
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    if !request.tools.iter().any(|t| t.name == name) {
        return None;
    }
    let arguments = if args.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(args).unwrap_or_else(|_| serde_json::json!({ "input": args }))
    };
    Some((name.to_string(), arguments))
}

fn into_chunks(response: ModelResponse) -> Vec<ModelChunk> {
    let mut chunks = Vec::new();
    for word in response.content.split_inclusive(' ') {
        chunks.push(ModelChunk::Content {
            text: word.to_string(),
        });
    }
    for call in response.tool_calls {
        chunks.push(ModelChunk::ToolCall(ToolCallEvent::Start {
            id: call.id.clone(),
            name: call.name,
        }));
        chunks.push(ModelChunk::ToolCall(ToolCallEvent::ArgumentsDelta {
            id: call.id.clone(),
            delta: call.arguments.to_string(),
        }));
        chunks.push(ModelChunk::ToolCall(ToolCallEvent::End { id: call.id }));
    }
    chunks.push(ModelChunk::Finish {
        reason: response.finish_reason,
        usage: Some(response.usage),
    });
    chunks
}

#[async_trait]
impl ModelProvider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, model: &str, request: &ModelRequest) -> Result<ModelResponse, SwitchyardError> {
        tracing::debug!(provider = %self.name, model, "local call");
        Ok(self.respond(model, request))
    }

    async fn stream(&self, model: &str, request: &ModelRequest) -> Result<ChunkStream, SwitchyardError> {
        tracing::debug!(provider = %self.name, model, "local stream");
        let chunks = into_chunks(self.respond(model, request));
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    async fn embed(&self, _model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, SwitchyardError> {
        Ok(inputs.iter().map(|text| byte_histogram(text)).collect())
    }
}

/// Normalized histogram of bytes folded into a few buckets.
fn byte_histogram(text: &str) -> Vec<f32> {
    let mut buckets = vec![0f32; EMBEDDING_DIMS];
    for byte in text.bytes() {
        buckets[byte as usize % EMBEDDING_DIMS] += 1.0;
    }
    let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        buckets.iter_mut().for_each(|v| *v /= norm);
    }
    buckets
}
