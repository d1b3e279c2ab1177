//! Events emitted by a streaming orchestration call.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SwitchyardError};
use crate::types::{AggregatedResponse, ReasoningDelta, ToolResult};

/// One event of `/stream`. `done` or `error` is always last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Delta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<ReasoningDelta>,
    },
    ToolEvent(ToolEvent),
    Done {
        response: AggregatedResponse,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

/// Tool-call lifecycle as seen by stream consumers. Names are the caller's
/// original tool names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ToolEvent {
    Start {
        id: String,
        name: String,
    },
    ArgumentsDelta {
        id: String,
        delta: String,
    },
    End {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    Result {
        result: ToolResult,
    },
}

impl StreamEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Delta {
            content: Some(text.into()),
            reasoning: None,
        }
    }

    pub fn reasoning(delta: ReasoningDelta) -> Self {
        Self::Delta {
            content: None,
            reasoning: Some(delta),
        }
    }

    pub fn error(err: &SwitchyardError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Delta { .. } => "delta",
            Self::ToolEvent(_) => "tool_event",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
