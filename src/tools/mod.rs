//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod external;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use external::{load_manifest, CommandTool, ExternalToolSpec};
pub use registry::ToolSet;
pub use tool::{AgentTool, Tool, ToolExecutionContext};
pub use types::AgentToolParameters;
