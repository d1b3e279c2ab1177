//! Convenience re-exports for common use.

pub use crate::admission::{AdmissionRoutes, AdmissionSlot, ConcurrencyLimiter, RateLimiter};
pub use crate::config::SwitchyardConfig;
pub use crate::error::{ErrorKind, Result, SwitchyardError};
pub use crate::orchestrator::{EventStream, Orchestrator, StreamEvent, ToolEvent};
pub use crate::provider::{ModelProvider, ModelRequest, ProviderRegistry};
pub use crate::tools::{AgentTool, Tool, ToolCallBudget, ToolDefinition, ToolRegistry, ToolServer};
pub use crate::types::{
    AggregatedResponse, CallSpec, GenerationSettings, ModelMessage, ProviderCandidate, Role,
    Termination, ToolCall, ToolChoice, ToolResult, Usage,
};
