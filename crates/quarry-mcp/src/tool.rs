use serde::{Deserialize, Serialize};

/// A tool discovered on a remote MCP server for the current request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTool {
    pub server_id: String,
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl RemoteTool {
    /// Collision-free name combining server and tool.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.server_id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tool(server: &str, name: &str) -> RemoteTool {
        RemoteTool {
            server_id: server.into(),
            name: name.into(),
            description: "a tool".into(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn qualified_name_format() {
        assert_eq!(make_tool("docs", "lookup").qualified_name(), "docs:lookup");
    }

    #[test]
    fn roundtrips_through_json() {
        let tool = make_tool("fs", "read_file");
        let json = serde_json::to_string(&tool).unwrap();
        let parsed: RemoteTool = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.server_id, "fs");
        assert_eq!(parsed.name, "read_file");
        assert_eq!(parsed.input_schema, tool.input_schema);
    }
}
