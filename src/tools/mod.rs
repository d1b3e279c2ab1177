//! Tools: definitions, execution, naming and budgeting.

pub mod arguments;
pub mod budget;
pub mod builtin;
pub mod registry;
pub mod remote;
pub mod sanitize;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use budget::ToolCallBudget;
pub use registry::ToolRegistry;
pub use remote::{RemoteTool, ToolServer, ToolServerRegistry};
pub use sanitize::{sanitize_tool_name, ToolNameTable};
pub use tool::{AgentTool, Tool, ToolExecutionContext};
pub use types::{ToolDefinition, ToolParameters};
pub use validation::validate_arguments;
