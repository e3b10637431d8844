//! ABOUTME: Tool registry and handler dispatch for the lacquer workflow engine
//! ABOUTME: Three handler kinds share one ToolHandler contract: script, MCP, and sub-workflow block

pub mod block;
pub mod error;
pub mod handler;
pub mod mcp;
pub mod registry;
pub mod script;

pub use block::BlockHandler;
pub use error::ToolError;
pub use handler::{ToolCallContext, ToolHandler};
pub use mcp::{McpAuth, McpAuthConfig, McpHandler, McpTransport};
pub use registry::ToolRegistry;
pub use script::{ScriptBody, ScriptHandler};
