//! Per-call tool-loop state shared by the blocking and streaming drivers.

use tokio_util::sync::CancellationToken;

use super::aggregate::ResponseAggregate;
use super::collect::ToolSet;
use super::dispatch::{dispatch_batch, DispatchedCall};
use super::prepare::prepare_messages;
use super::Orchestrator;
use crate::config::ToolLoopConfig;
use crate::error::SwitchyardError;
use crate::provider::ModelRequest;
use crate::tools::ToolCallBudget;
use crate::types::{
    AggregatedResponse, CallSpec, ContentPart, GenerationSettings, ModelMessage, ModelResponse,
    ProviderCandidate, Termination, ToolCall, ToolChoice,
};

/// What to do after a model turn.
#[derive(Debug, PartialEq)]
pub enum TurnDecision {
    Finish(Termination),
    Dispatch(Vec<ToolCall>),
}

/// History, budget and totals for one orchestration call. Owned by the task
/// running that call.
#[derive(Debug)]
pub struct LoopState {
    messages: Vec<ModelMessage>,
    budget: ToolCallBudget,
    tools: ToolSet,
    tool_choice: ToolChoice,
    settings: GenerationSettings,
    policy: ToolLoopConfig,
    metadata: serde_json::Value,
    iterations: u32,
    final_prompt_sent: bool,
    aggregate: ResponseAggregate,
    served_by: Option<(String, String)>,
}

impl LoopState {
    /// Validate `spec` and build the working state.
    pub async fn prepare(
        orchestrator: &Orchestrator,
        spec: &CallSpec,
    ) -> Result<Self, SwitchyardError> {
        spec.validate()?;
        for candidate in &spec.candidates {
            orchestrator.providers.get(&candidate.provider)?;
        }
        let budget = ToolCallBudget::new(spec.max_tool_calls)?;
        let tools = ToolSet::collect(spec, &orchestrator.tools, &orchestrator.tool_servers).await?;
        let tool_choice = tools.resolve_choice(&spec.tool_choice)?;
        let policy = orchestrator.tool_loop.resolve(spec.tool_loop.as_ref());

        tracing::debug!(
            candidates = spec.candidates.len(),
            tools = tools.len(),
            max_tool_calls = ?budget.max_calls(),
            "prepared orchestration call"
        );

        Ok(Self {
            messages: prepare_messages(spec.system.as_deref(), &spec.messages),
            budget,
            tools,
            tool_choice,
            settings: spec.settings.clone(),
            policy,
            metadata: serde_json::Value::Object(spec.metadata.clone()),
            iterations: 0,
            final_prompt_sent: false,
            aggregate: ResponseAggregate::default(),
            served_by: None,
        })
    }

    pub fn policy(&self) -> &ToolLoopConfig {
        &self.policy
    }

    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn budget(&self) -> &ToolCallBudget {
        &self.budget
    }

    /// Tools are withheld once the budget is spent.
    pub fn tools_withheld(&self) -> bool {
        self.tools.is_empty() || self.budget.exhausted()
    }

    /// Request for the next model call on `candidate`.
    pub fn request_for(&self, candidate: &ProviderCandidate) -> ModelRequest {
        let settings = match &candidate.settings {
            Some(overlay) => self.settings.overlay(overlay),
            None => self.settings.clone(),
        };
        let (tools, tool_choice) = if self.tools_withheld() {
            (Vec::new(), ToolChoice::Auto)
        } else {
            (self.tools.definitions(), self.tool_choice.clone())
        };
        ModelRequest {
            messages: self.messages.clone(),
            tools,
            tool_choice,
            settings,
        }
    }

    /// Fold a finished model turn into the totals and decide what comes next.
    pub fn record_turn(
        &mut self,
        candidate: &ProviderCandidate,
        response: &ModelResponse,
    ) -> TurnDecision {
        self.iterations += 1;
        self.served_by = Some((candidate.provider.clone(), candidate.model.clone()));
        self.aggregate.absorb_turn(response);

        if response.tool_calls.is_empty() {
            let termination = if self.budget.exhausted() && self.budget.used() > 0 {
                Termination::BudgetExhausted
            } else {
                Termination::Completed
            };
            return TurnDecision::Finish(termination);
        }
        if self.tools_withheld() {
            tracing::debug!("model requested tools after they were withheld");
            return TurnDecision::Finish(Termination::BudgetExhausted);
        }
        if self.iterations >= self.policy.max_iterations {
            tracing::debug!(iterations = self.iterations, "tool loop hit max iterations");
            return TurnDecision::Finish(Termination::IterationLimit);
        }
        TurnDecision::Dispatch(response.tool_calls.clone())
    }

    /// Dispatch one turn's calls against this call's tools and budget.
    pub async fn dispatch(
        &mut self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Result<Vec<DispatchedCall>, SwitchyardError> {
        dispatch_batch(
            calls,
            &self.tools,
            &mut self.budget,
            self.policy.parallel_execution,
            &self.metadata,
            cancel,
        )
        .await
    }

    /// Append the assistant turn and its results, then the countdown and,
    /// once the budget is spent, the final-prompt directive.
    pub fn apply_dispatch(
        &mut self,
        text: String,
        calls: Vec<ToolCall>,
        outcomes: &[DispatchedCall],
    ) {
        self.messages
            .push(ModelMessage::assistant_with_tool_calls(text, calls));
        for outcome in outcomes {
            self.messages
                .push(ModelMessage::tool_result(outcome.result.clone()));
        }
        if self.policy.countdown_enabled {
            if let (Some(countdown), Some(last)) =
                (self.budget.countdown_message(), self.messages.last_mut())
            {
                last.content.push(ContentPart::Text { text: countdown });
            }
        }
        self.aggregate.record_dispatch(outcomes, &self.tools);

        if self.budget.exhausted()
            && !self.budget.is_unbounded()
            && self.policy.final_prompt_enabled
            && !self.final_prompt_sent
        {
            self.messages
                .push(ModelMessage::user(self.budget.final_prompt_message()));
            self.final_prompt_sent = true;
        }
    }

    pub fn finish(self, termination: Termination) -> AggregatedResponse {
        let (provider, model) = self.served_by.unwrap_or_default();
        tracing::debug!(%termination, iterations = self.iterations, "tool loop finished");
        self.aggregate
            .finish(termination, provider, model, self.iterations)
    }
}
