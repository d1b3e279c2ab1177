//! Per-request orchestration input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::generation::GenerationSettings;
use super::message::ModelMessage;
use crate::error::SwitchyardError;
use crate::tools::ToolDefinition;
use crate::util::retry::MAX_RETRY_DELAY;

/// One `(provider, model)` entry of the fallback list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProviderCandidate {
    pub provider: String,
    pub model: String,
    /// Settings overlaid on the call-level settings for this candidate only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<GenerationSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryOverrides>,
}

impl ProviderCandidate {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            settings: None,
            retry: None,
        }
    }
}

impl fmt::Display for ProviderCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

impl FromStr for ProviderCandidate {
    type Err = SwitchyardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Ok(Self::new(provider, model))
            }
            _ => Err(SwitchyardError::Validation(format!(
                "candidate must be 'provider:model', got '{s}'"
            ))),
        }
    }
}

/// Per-candidate retry policy fields; unset fields fall back to config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetryOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_schedule_secs: Option<Vec<f64>>,
}

impl RetryOverrides {
    /// Reject delays that are negative, non-finite or longer than
    /// [`MAX_RETRY_DELAY`].
    pub fn validate(&self) -> crate::error::Result<()> {
        let max_secs = MAX_RETRY_DELAY.as_secs_f64();
        if let Some(multiplier) = self.multiplier {
            if !multiplier.is_finite() || multiplier < 0.0 {
                return Err(SwitchyardError::Validation(format!(
                    "retry.multiplier must be a non-negative number, got {multiplier}"
                )));
            }
        }
        if let Some(ms) = self.base_delay_ms {
            if ms as f64 / 1000.0 > max_secs {
                return Err(SwitchyardError::Validation(format!(
                    "retry.base_delay_ms must be at most {}, got {ms}",
                    MAX_RETRY_DELAY.as_millis()
                )));
            }
        }
        for secs in self.rate_limit_schedule_secs.iter().flatten() {
            if !secs.is_finite() || *secs < 0.0 || *secs > max_secs {
                return Err(SwitchyardError::Validation(format!(
                    "retry.rate_limit_schedule_secs entries must be within 0..={max_secs}, got {secs}"
                )));
            }
        }
        Ok(())
    }
}

/// Per-request tool-loop overrides; unset fields fall back to config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToolLoopOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_prompt_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_execution: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// How the model may use tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ToolChoiceRepr", into = "ToolChoiceRepr")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Function { name: String },
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ToolChoiceRepr {
    Mode(String),
    Function { name: String },
}

impl TryFrom<ToolChoiceRepr> for ToolChoice {
    type Error = String;

    fn try_from(repr: ToolChoiceRepr) -> Result<Self, Self::Error> {
        match repr {
            ToolChoiceRepr::Mode(mode) => match mode.as_str() {
                "auto" => Ok(Self::Auto),
                "none" => Ok(Self::None),
                "required" => Ok(Self::Required),
                other => Err(format!("unknown tool_choice '{other}'")),
            },
            ToolChoiceRepr::Function { name } => Ok(Self::Function { name }),
        }
    }
}

impl From<ToolChoice> for ToolChoiceRepr {
    fn from(choice: ToolChoice) -> Self {
        match choice {
            ToolChoice::Auto => Self::Mode("auto".into()),
            ToolChoice::None => Self::Mode("none".into()),
            ToolChoice::Required => Self::Mode("required".into()),
            ToolChoice::Function { name } => Self::Function { name },
        }
    }
}

/// Immutable input of one orchestration call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CallSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default)]
    pub messages: Vec<ModelMessage>,
    #[serde(default)]
    pub candidates: Vec<ProviderCandidate>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Names of registered local tools to expose.
    #[serde(default)]
    pub functions: Vec<String>,
    /// Ids of registered tool servers whose tools are exposed.
    #[serde(default)]
    pub tool_servers: Vec<String>,
    #[serde(default)]
    pub tool_choice: ToolChoice,
    /// Absent means unbounded. Signed so negative input can be rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_loop: Option<ToolLoopOverrides>,
    #[serde(default)]
    pub settings: GenerationSettings,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CallSpec {
    /// Reject structurally invalid input before any model call.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.candidates.is_empty() {
            return Err(SwitchyardError::NoCandidates);
        }
        for candidate in &self.candidates {
            if candidate.provider.trim().is_empty() || candidate.model.trim().is_empty() {
                return Err(SwitchyardError::Validation(
                    "candidate provider and model must be non-empty".into(),
                ));
            }
            if let Some(retry) = &candidate.retry {
                retry.validate()?;
            }
        }
        if self.messages.is_empty() && self.system.is_none() {
            return Err(SwitchyardError::Validation(
                "at least one message or a system prompt is required".into(),
            ));
        }
        if let Some(n) = self.max_tool_calls {
            if n < 0 {
                return Err(SwitchyardError::InvalidArgument(format!(
                    "max_tool_calls must be non-negative, got {n}"
                )));
            }
        }
        Ok(())
    }
}
