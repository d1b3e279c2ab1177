//! Backend-level streaming chunks and non-streaming responses.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::message::ToolCall;
use super::response::ReasoningAggregate;
use super::usage::Usage;

/// Reasoning fragment carried by one chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReasoningDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ReasoningDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            metadata: None,
        }
    }
}

/// Tool-call lifecycle event emitted by a backend stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ToolCallEvent {
    Start { id: String, name: String },
    ArgumentsDelta { id: String, delta: String },
    End { id: String },
}

impl ToolCallEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::Start { id, .. } | Self::ArgumentsDelta { id, .. } | Self::End { id } => id,
        }
    }
}

/// One chunk of a streaming model call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelChunk {
    Content { text: String },
    Reasoning(ReasoningDelta),
    ToolCall(ToolCallEvent),
    Finish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<FinishReason>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}

/// Result of one non-streaming model call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningAggregate>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        }
    }
}
