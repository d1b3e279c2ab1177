//! Shared test helpers and scripted mock provider.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use switchyard::config::ToolLoopConfig;
use switchyard::error::SwitchyardError;
use switchyard::orchestrator::Orchestrator;
use switchyard::provider::{ChunkStream, ModelProvider, ModelRequest, ProviderRegistry};
use switchyard::types::*;
use switchyard::util::{AttemptReport, FallbackEngine, RetryObserver, RetryPolicy};

/// One scripted reply, consumed by either `call` or `stream`.
pub enum Step {
    Respond(ModelResponse),
    Chunks(Vec<ModelChunk>),
    /// Chunks followed by a mid-stream failure.
    ChunksThenFail(Vec<ModelChunk>, u16),
    Fail(u16),
    /// Never completes; for cancellation tests.
    Hang,
}

/// A provider that replays queued steps and records every request.
pub struct ScriptedProvider {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    /// Replayed once the queue is empty.
    fallback: Option<u16>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            steps: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Fails every call with `status`.
    pub fn failing(name: &str, status: u16) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            steps: Mutex::new(VecDeque::new()),
            fallback: Some(status),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, step: Step) -> &Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    pub fn push_text(&self, text: &str) -> &Self {
        self.push(Step::Respond(ModelResponse::text(text)))
    }

    pub fn push_tool_calls(&self, calls: &[(&str, &str, serde_json::Value)]) -> &Self {
        let calls = calls
            .iter()
            .map(|(id, name, args)| ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: args.clone(),
            })
            .collect();
        self.push(Step::Respond(ModelResponse::tool_calls(calls)))
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_step(&self, request: &ModelRequest) -> Step {
        self.requests.lock().unwrap().push(request.clone());
        match self.steps.lock().unwrap().pop_front() {
            Some(step) => step,
            None => Step::Fail(self.fallback.unwrap_or(500)),
        }
    }
}

fn backend_error(status: u16) -> SwitchyardError {
    if status == 429 {
        SwitchyardError::BackendRateLimited {
            retry_after_ms: None,
        }
    } else {
        SwitchyardError::backend(status, "scripted failure")
    }
}

fn response_chunks(response: ModelResponse) -> Vec<ModelChunk> {
    let mut chunks = Vec::new();
    if !response.content.is_empty() {
        chunks.push(ModelChunk::Content {
            text: response.content,
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
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        _model: &str,
        request: &ModelRequest,
    ) -> Result<ModelResponse, SwitchyardError> {
        match self.next_step(request) {
            Step::Respond(response) => Ok(response),
            Step::Fail(status) | Step::ChunksThenFail(_, status) => Err(backend_error(status)),
            Step::Chunks(_) => Err(SwitchyardError::backend(500, "scripted stream used by call")),
            Step::Hang => std::future::pending().await,
        }
    }

    async fn stream(
        &self,
        _model: &str,
        request: &ModelRequest,
    ) -> Result<ChunkStream, SwitchyardError> {
        let items: Vec<Result<ModelChunk, SwitchyardError>> = match self.next_step(request) {
            Step::Respond(response) => response_chunks(response).into_iter().map(Ok).collect(),
            Step::Chunks(chunks) => chunks.into_iter().map(Ok).collect(),
            Step::ChunksThenFail(chunks, status) => chunks
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(backend_error(status))))
                .collect(),
            Step::Fail(status) => return Err(backend_error(status)),
            Step::Hang => {
                return Ok(Box::pin(stream::pending()));
            }
        };
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Records every failed attempt.
#[derive(Default)]
pub struct RecordingObserver {
    pub attempts: Mutex<Vec<(String, u32, bool, Option<Duration>)>>,
}

impl RetryObserver for RecordingObserver {
    fn on_failed_attempt(&self, report: &AttemptReport<'_>) {
        self.attempts.lock().unwrap().push((
            report.provider.to_string(),
            report.attempt,
            report.rate_limited,
            report.next_delay,
        ));
    }
}

pub fn registry(providers: &[Arc<ScriptedProvider>]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider.clone());
    }
    registry
}

/// Orchestrator over scripted providers with the default tool loop.
pub fn orchestrator(providers: &[Arc<ScriptedProvider>], policy: RetryPolicy) -> Orchestrator {
    Orchestrator::new(registry(providers), FallbackEngine::new(policy))
}

pub fn orchestrator_with_loop(
    providers: &[Arc<ScriptedProvider>],
    tool_loop: ToolLoopConfig,
) -> Orchestrator {
    orchestrator(providers, no_retry()).with_tool_loop(tool_loop)
}

/// One attempt per candidate.
pub fn no_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        rate_limit_schedule: Vec::new(),
        ..Default::default()
    }
}

pub fn spec(candidates: &[&str], prompt: &str) -> CallSpec {
    CallSpec {
        messages: vec![ModelMessage::user(prompt)],
        candidates: candidates
            .iter()
            .map(|c| c.parse().expect("candidate"))
            .collect(),
        ..Default::default()
    }
}
