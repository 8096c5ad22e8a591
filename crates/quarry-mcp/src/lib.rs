//! MCP client sessions scoped to a single generation call: connect, list
//! tools, proxy invocations, tear down.

pub mod error;
pub mod gateway;
pub mod session;
pub mod tool;

pub use error::McpError;
pub use gateway::{ServerDecl, ToolGateway};
pub use session::McpSession;
pub use tool::RemoteTool;
