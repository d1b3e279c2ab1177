//! Tests for core types.

use pretty_assertions::assert_eq;
use serde_json::json;

use switchyard::types::*;

#[test]
fn message_constructors_set_role_and_text() {
    let msg = ModelMessage::system("You are helpful.");
    assert_eq!(msg.role, Role::System);
    assert_eq!(msg.text(), "You are helpful.");

    let msg = ModelMessage::user("Hello");
    assert_eq!(msg.role, Role::User);
    assert!(!msg.is_empty());
    assert!(ModelMessage::assistant("  ").is_empty());
}

#[test]
fn assistant_tool_call_message_keeps_calls_in_order() {
    let calls = vec![
        ToolCall {
            id: "1".into(),
            name: "a".into(),
            arguments: json!({}),
        },
        ToolCall {
            id: "2".into(),
            name: "b".into(),
            arguments: json!({"x": 1}),
        },
    ];
    let msg = ModelMessage::assistant_with_tool_calls("", calls);
    assert_eq!(msg.text(), "");
    let names: Vec<_> = msg.tool_calls().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    let result = ModelMessage::tool_result(ToolResult::error("2", "nope"));
    assert_eq!(result.role, Role::Tool);
    assert!(result.tool_results()[0].is_error);
}

#[test]
fn call_spec_from_json_with_candidate_overrides() {
    let spec: CallSpec = serde_json::from_value(json!({
        "system": "be brief",
        "messages": [{"role": "user", "content": "hi"}],
        "candidates": [
            {"provider": "a", "model": "m1", "settings": {"temperature": 0.1}},
            {"provider": "b", "model": "m2", "retry": {"max_attempts": 1}}
        ],
        "settings": {"max_tokens": 64, "temperature": 0.7},
        "tool_loop": {"parallel_execution": true}
    }))
    .unwrap();
    spec.validate().unwrap();

    let first = spec.candidates[0].settings.as_ref().unwrap();
    let merged = spec.settings.overlay(first);
    assert_eq!(merged.max_tokens, Some(64));
    assert_eq!(merged.temperature, Some(0.1));
    assert_eq!(spec.candidates[1].retry.as_ref().unwrap().max_attempts, Some(1));
}

#[test]
fn empty_spec_fails_validation() {
    let spec = CallSpec {
        candidates: vec![ProviderCandidate::new("a", "m")],
        ..Default::default()
    };
    assert!(spec.validate().is_err());
}

#[test]
fn reasoning_metadata_ignores_nulls() {
    let mut agg = ReasoningAggregate::default();
    let mut first = serde_json::Map::new();
    first.insert("signature".into(), json!("abc"));
    agg.push(&ReasoningDelta {
        text: Some("step 1. ".into()),
        metadata: Some(first),
    });
    let mut second = serde_json::Map::new();
    second.insert("signature".into(), serde_json::Value::Null);
    agg.push(&ReasoningDelta {
        text: Some("step 2.".into()),
        metadata: Some(second),
    });
    assert_eq!(agg.text, "step 1. step 2.");
    assert_eq!(agg.metadata["signature"], "abc");
}

#[test]
fn usage_merge_accumulates() {
    let mut total = Usage::default();
    total.merge(&Usage {
        input_tokens: 3,
        output_tokens: 2,
        total_tokens: 5,
        reasoning_tokens: None,
    });
    total.merge(&Usage {
        input_tokens: 1,
        output_tokens: 1,
        total_tokens: 2,
        reasoning_tokens: Some(4),
    });
    assert_eq!(total.total_tokens, 7);
    assert_eq!(total.input_tokens, 4);
}

#[test]
fn finish_reason_maps_wire_values() {
    assert_eq!(FinishReason::from_wire("tool_calls"), Some(FinishReason::ToolCalls));
    assert_eq!(FinishReason::from_wire("max_tokens"), Some(FinishReason::Length));
    assert_eq!(FinishReason::from_wire("weird"), None);
}
