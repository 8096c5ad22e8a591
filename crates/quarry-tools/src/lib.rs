//! Tool specs, the two fixed retrieval tools, and the per-request catalog
//! that merges them with remote MCP tools.

pub mod catalog;
pub mod retrieval;
pub mod spec;

pub use catalog::{ToolCatalog, ToolInvocation};
pub use retrieval::{
    CONTENT_TOOL_NAME, SYMBOL_TOOL_NAME, augment_with_namespaces, content_search_tool,
    symbol_search_tool,
};
pub use spec::{ToolError, ToolSpec};
