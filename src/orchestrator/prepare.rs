//! Conversation history normalization before the first model call.

use std::collections::{HashMap, HashSet};

use crate::types::{ModelMessage, Role, ToolResult};

const MISSING_RESULT: &str = "missing tool result in history; inserted synthetic error result";

/// Build the working history for one call.
///
/// The system prompt (if any) comes first, blank messages are dropped, and
/// assistant tool calls are re-paired with their results: each call is
/// followed by exactly one result, orphaned tool messages are removed.
pub fn prepare_messages(system: Option<&str>, messages: &[ModelMessage]) -> Vec<ModelMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
        out.push(ModelMessage::system(system));
    }
    let kept: Vec<ModelMessage> = messages.iter().filter(|m| !m.is_empty()).cloned().collect();
    out.extend(repair_tool_pairing(&kept));
    out
}

fn repair_tool_pairing(messages: &[ModelMessage]) -> Vec<ModelMessage> {
    let mut out = Vec::with_capacity(messages.len());
    let mut answered: HashSet<String> = HashSet::new();

    let mut i = 0;
    while i < messages.len() {
        let msg = &messages[i];
        let calls = msg.tool_calls();
        if msg.role != Role::Assistant || calls.is_empty() {
            if msg.role == Role::Tool {
                tracing::debug!("dropping tool message without a preceding call");
            } else {
                out.push(msg.clone());
            }
            i += 1;
            continue;
        }

        let call_ids: HashSet<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        let mut results: HashMap<String, ModelMessage> = HashMap::new();

        let mut j = i + 1;
        while j < messages.len() && messages[j].role == Role::Tool {
            for result in messages[j].tool_results() {
                let id = result.tool_call_id.as_str();
                if call_ids.contains(id) && answered.insert(id.to_string()) {
                    results.insert(id.to_string(), messages[j].clone());
                }
            }
            j += 1;
        }

        out.push(msg.clone());
        for call in calls {
            match results.remove(&call.id) {
                Some(existing) => out.push(existing),
                None => out.push(ModelMessage::tool_result(ToolResult::error(
                    call.id.clone(),
                    MISSING_RESULT,
                ))),
            }
        }
        i = j;
    }

    out
}
