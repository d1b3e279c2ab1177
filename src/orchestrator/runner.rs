//! Non-streaming tool loop.

use tokio_util::sync::CancellationToken;

use super::state::{LoopState, TurnDecision};
use super::Orchestrator;
use crate::error::SwitchyardError;
use crate::types::{AggregatedResponse, CallSpec};
use crate::util::timeout::with_timeout;

impl Orchestrator {
    /// Run `spec` to completion and return the aggregated response.
    pub async fn run(
        &self,
        spec: &CallSpec,
        cancel: &CancellationToken,
    ) -> Result<AggregatedResponse, SwitchyardError> {
        let state = LoopState::prepare(self, spec).await?;
        let timeout = state.policy().timeout();
        with_timeout(timeout, self.drive(state, spec, cancel)).await
    }

    async fn drive(
        &self,
        mut state: LoopState,
        spec: &CallSpec,
        cancel: &CancellationToken,
    ) -> Result<AggregatedResponse, SwitchyardError> {
        loop {
            let (index, response) = {
                let state = &state;
                self.engine
                    .execute(&spec.candidates, cancel, |_, candidate| {
                        let provider = self.providers.get(&candidate.provider);
                        let model = candidate.model.clone();
                        let request = state.request_for(candidate);
                        async move {
                            tracing::debug!(%model, messages = request.messages.len(), "calling model");
                            provider?.call(&model, &request).await
                        }
                    })
                    .await?
            };

            let candidate = &spec.candidates[index];
            let calls = match state.record_turn(candidate, &response) {
                TurnDecision::Finish(termination) => return Ok(state.finish(termination)),
                TurnDecision::Dispatch(calls) => calls,
            };

            let outcomes = state.dispatch(&calls, cancel).await?;
            state.apply_dispatch(response.content, calls, &outcomes);
        }
    }
}
