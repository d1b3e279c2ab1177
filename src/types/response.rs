//! Aggregated orchestration results.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::generation::FinishReason;
use super::message::{ToolCall, ToolResult};
use super::stream::ReasoningDelta;
use super::usage::Usage;

/// Reasoning text plus shallow-merged metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReasoningAggregate {
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ReasoningAggregate {
    /// Append a fragment. Later non-null metadata values overwrite earlier ones.
    pub fn push(&mut self, delta: &ReasoningDelta) {
        if let Some(text) = &delta.text {
            self.text.push_str(text);
        }
        if let Some(metadata) = &delta.metadata {
            self.merge_metadata(metadata);
        }
    }

    pub fn merge(&mut self, other: &ReasoningAggregate) {
        self.text.push_str(&other.text);
        self.merge_metadata(&other.metadata);
    }

    fn merge_metadata(&mut self, metadata: &serde_json::Map<String, serde_json::Value>) {
        for (key, value) in metadata {
            if !value.is_null() {
                self.metadata.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.metadata.is_empty()
    }
}

/// How the tool loop ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
    Completed,
    BudgetExhausted,
    IterationLimit,
}

/// Final result of an orchestration call, across all model turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningAggregate>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    pub termination: Termination,
    pub provider: String,
    pub model: String,
    pub iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reasoning_concatenates_and_merges_metadata() {
        let mut agg = ReasoningAggregate::default();
        agg.push(&ReasoningDelta::text("A"));
        agg.push(&ReasoningDelta {
            text: Some("B".into()),
            metadata: json!({"k": 1}).as_object().cloned(),
        });
        assert_eq!(agg.text, "AB");
        assert_eq!(serde_json::Value::Object(agg.metadata), json!({"k": 1}));
    }

    #[test]
    fn null_metadata_does_not_overwrite() {
        let mut agg = ReasoningAggregate::default();
        agg.push(&ReasoningDelta {
            text: None,
            metadata: json!({"k": 1, "sig": "a"}).as_object().cloned(),
        });
        agg.push(&ReasoningDelta {
            text: None,
            metadata: json!({"k": null, "sig": "b"}).as_object().cloned(),
        });
        assert_eq!(
            serde_json::Value::Object(agg.metadata),
            json!({"k": 1, "sig": "b"})
        );
    }
}
