//! Streaming tool loop as an explicit, pull-driven state machine.
//!
//! Each poll of the returned stream advances the machine until it has at
//! least one event to hand out. Follow-up model calls after tool dispatch are
//! a transition back to [`Phase::CallModel`].

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::aggregate::TurnAggregator;
use super::events::{StreamEvent, ToolEvent};
use super::state::{LoopState, TurnDecision};
use super::Orchestrator;
use crate::error::SwitchyardError;
use crate::provider::ChunkStream;
use crate::types::{CallSpec, ModelChunk, ProviderCandidate, ToolCall, ToolCallEvent};
use crate::util::timeout::with_timeout;

/// Events of one streaming call; ends after `done` or `error`.
pub type EventStream = BoxStream<'static, StreamEvent>;

enum Phase {
    CallModel,
    Streaming {
        chunks: ChunkStream,
        turn: TurnAggregator,
        candidate: ProviderCandidate,
    },
    Dispatch {
        text: String,
        calls: Vec<ToolCall>,
    },
    Finished,
}

struct StreamDriver {
    orchestrator: Orchestrator,
    candidates: Vec<ProviderCandidate>,
    state: Option<LoopState>,
    phase: Phase,
    pending: VecDeque<StreamEvent>,
    cancel: CancellationToken,
    step_timeout: Option<Duration>,
}

impl Orchestrator {
    /// Start a streaming call.
    ///
    /// Validation and tool collection happen before this returns, so input
    /// errors surface as `Err` rather than as an `error` event.
    pub async fn stream(
        &self,
        spec: CallSpec,
        cancel: CancellationToken,
    ) -> Result<EventStream, SwitchyardError> {
        let state = LoopState::prepare(self, &spec).await?;
        let driver = StreamDriver {
            orchestrator: self.clone(),
            candidates: spec.candidates,
            step_timeout: state.policy().timeout(),
            state: Some(state),
            phase: Phase::CallModel,
            pending: VecDeque::new(),
            cancel,
        };
        Ok(stream::unfold(driver, |mut driver| async move {
            let event = driver.next_event().await?;
            Some((event, driver))
        })
        .boxed())
    }
}

impl StreamDriver {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if matches!(self.phase, Phase::Finished) {
                return None;
            }

            let cancel = self.cancel.clone();
            let step_timeout = self.step_timeout;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(SwitchyardError::ClientAborted),
                outcome = with_timeout(step_timeout, self.step()) => outcome,
            };
            if let Err(error) = outcome {
                tracing::debug!(%error, "stream ended with error");
                self.phase = Phase::Finished;
                self.state = None;
                self.pending.push_back(StreamEvent::error(&error));
            }
        }
    }

    async fn step(&mut self) -> Result<(), SwitchyardError> {
        let Some(state) = self.state.as_mut() else {
            self.phase = Phase::Finished;
            return Ok(());
        };

        match std::mem::replace(&mut self.phase, Phase::Finished) {
            Phase::CallModel => {
                let providers = &self.orchestrator.providers;
                let shared: &LoopState = state;
                let (index, chunks) = self
                    .orchestrator
                    .engine
                    .execute(&self.candidates, &self.cancel, |_, candidate| {
                        let provider = providers.get(&candidate.provider);
                        let model = candidate.model.clone();
                        let request = shared.request_for(candidate);
                        async move {
                            tracing::debug!(%model, messages = request.messages.len(), "opening model stream");
                            provider?.stream(&model, &request).await
                        }
                    })
                    .await?;
                self.phase = Phase::Streaming {
                    chunks,
                    turn: TurnAggregator::default(),
                    candidate: self.candidates[index].clone(),
                };
            }

            Phase::Streaming {
                mut chunks,
                mut turn,
                candidate,
            } => match chunks.next().await {
                Some(Ok(chunk)) => {
                    let completed = turn.push(&chunk);
                    self.emit_chunk(chunk, completed);
                    self.phase = Phase::Streaming {
                        chunks,
                        turn,
                        candidate,
                    };
                }
                Some(Err(error)) => {
                    return Err(SwitchyardError::provider_execution(
                        &candidate.provider,
                        &candidate.model,
                        error,
                    ));
                }
                None => {
                    for call in turn.close_open() {
                        self.emit_end(call);
                    }
                    let response = turn.into_response();
                    let Some(state) = self.state.as_mut() else {
                        return Ok(());
                    };
                    match state.record_turn(&candidate, &response) {
                        TurnDecision::Finish(termination) => {
                            if let Some(state) = self.state.take() {
                                self.pending.push_back(StreamEvent::Done {
                                    response: state.finish(termination),
                                });
                            }
                        }
                        TurnDecision::Dispatch(calls) => {
                            self.phase = Phase::Dispatch {
                                text: response.content,
                                calls,
                            };
                        }
                    }
                }
            },

            Phase::Dispatch { text, calls } => {
                let outcomes = state.dispatch(&calls, &self.cancel).await?;
                for outcome in &outcomes {
                    self.pending
                        .push_back(StreamEvent::ToolEvent(ToolEvent::Result {
                            result: outcome.result.clone(),
                        }));
                }
                state.apply_dispatch(text, calls, &outcomes);
                self.phase = Phase::CallModel;
            }

            Phase::Finished => {}
        }
        Ok(())
    }

    fn emit_chunk(&mut self, chunk: ModelChunk, completed: Option<ToolCall>) {
        match chunk {
            ModelChunk::Content { text } if !text.is_empty() => {
                self.pending.push_back(StreamEvent::content(text));
            }
            ModelChunk::Reasoning(delta) => {
                self.pending.push_back(StreamEvent::reasoning(delta));
            }
            ModelChunk::ToolCall(ToolCallEvent::Start { id, name }) => {
                let name = self.original_name(&name);
                self.pending
                    .push_back(StreamEvent::ToolEvent(ToolEvent::Start { id, name }));
            }
            ModelChunk::ToolCall(ToolCallEvent::ArgumentsDelta { id, delta }) => {
                self.pending
                    .push_back(StreamEvent::ToolEvent(ToolEvent::ArgumentsDelta { id, delta }));
            }
            ModelChunk::ToolCall(ToolCallEvent::End { .. }) => {
                if let Some(call) = completed {
                    self.emit_end(call);
                }
            }
            ModelChunk::Content { .. } | ModelChunk::Finish { .. } => {}
        }
    }

    fn emit_end(&mut self, call: ToolCall) {
        let name = self.original_name(&call.name);
        self.pending.push_back(StreamEvent::ToolEvent(ToolEvent::End {
            id: call.id,
            name,
            arguments: call.arguments,
        }));
    }

    fn original_name(&self, sanitized: &str) -> String {
        match &self.state {
            Some(state) => state.tools().original_name(sanitized).to_string(),
            None => sanitized.to_string(),
        }
    }
}
