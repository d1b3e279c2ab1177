//! Built-in tools exposed through `functions`.
//!
//! Each tool is an [`AgentTool`] closure returned as `Arc<dyn Tool>`.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::error::SwitchyardError;
use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext};
use crate::tools::types::ToolParameters;

/// `current_time`: the current UTC time, optionally with a fixed offset.
pub fn current_time_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "current_time",
        "Return the current date and time in RFC 3339 format",
        ToolParameters::object()
            .integer(
                "utc_offset_minutes",
                "Offset from UTC in minutes, e.g. 120 for UTC+2",
                false,
            )
            .build(),
        |args, _ctx: ToolExecutionContext| async move {
            let offset_minutes = args
                .raw()
                .get("utc_offset_minutes")
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let offset = i32::try_from(offset_minutes * 60)
                .ok()
                .and_then(chrono::FixedOffset::east_opt)
                .ok_or_else(|| SwitchyardError::ToolExecution {
                    tool_name: "current_time".into(),
                    message: format!("utc offset {offset_minutes} minutes is out of range"),
                })?;
            let now = Utc::now().with_timezone(&offset);
            Ok::<_, SwitchyardError>(serde_json::json!({
                "iso8601": now.to_rfc3339_opts(SecondsFormat::Secs, true),
                "unix_seconds": now.timestamp(),
            }))
        },
    ))
}

/// `random_uuid`: one or more random v4 UUIDs.
pub fn random_uuid_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "random_uuid",
        "Generate random version 4 UUIDs",
        ToolParameters::object()
            .integer("count", "How many UUIDs to generate (1-32)", false)
            .build(),
        |args, _ctx: ToolExecutionContext| async move {
            let count = args.raw().get("count").and_then(|v| v.as_i64()).unwrap_or(1);
            if !(1..=32).contains(&count) {
                return Err(SwitchyardError::ToolExecution {
                    tool_name: "random_uuid".into(),
                    message: format!("count must be between 1 and 32, got {count}"),
                });
            }
            let ids: Vec<String> = (0..count)
                .map(|_| uuid::Uuid::new_v4().to_string())
                .collect();
            Ok(serde_json::json!({ "uuids": ids }))
        },
    ))
}

pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    vec![current_time_tool(), random_uuid_tool()]
}
