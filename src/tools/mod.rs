//! Tools module — the two retrieval capabilities the router can pick
//!
//! A tool wraps a query engine behind a uniform `{name, description,
//! invoke}` contract. The catalog is built once at workflow construction
//! and is immutable afterwards.

mod document;
mod sql;

pub use document::DocumentTool;
pub use sql::SqlTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::Result;

/// Tool definition handed to the reasoning client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tool trait — interface for the retrieval backends
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within a catalog
    fn name(&self) -> &str;

    /// Description the reasoning client uses to decide applicability
    fn description(&self) -> &str;

    /// JSON Schema for the arguments
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural language question for this tool"
                }
            },
            "required": ["query"]
        })
    }

    /// Execute the tool with the given arguments
    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String>;

    /// Convert to a definition for the reasoning client
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// A query-engine seam: anything that can turn a natural language
/// question into a textual result. The SQL and document adapters are
/// thin wrappers over implementations of this trait.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, query: &str) -> Result<String>;
}

/// Extract the `query` string argument shared by both adapters
pub(crate) fn query_argument(arguments: &Map<String, Value>) -> Result<&str> {
    arguments
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Tool("missing 'query' argument".to_string()))
}

/// Immutable mapping from tool name to adapter.
///
/// Read-only after construction, safe to share across workflows.
pub struct ToolCatalog {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolCatalog {
    /// Build a catalog from a fixed tool list.
    ///
    /// Fails on an empty list or a duplicate name; both are
    /// configuration errors surfaced at construction, never defaulted.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        if tools.is_empty() {
            return Err(Error::Config("tool catalog is empty".to_string()));
        }
        let mut map: HashMap<String, Arc<dyn Tool>> = HashMap::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name().to_string();
            if map.insert(name.clone(), tool).is_some() {
                return Err(Error::Config(format!("duplicate tool name: {}", name)));
            }
        }
        Ok(Self { tools: map })
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions for the reasoning client, sorted by name for a
    /// stable prompt
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Dummy tool for testing
pub struct DummyTool {
    pub name: String,
    pub result: String,
}

#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Dummy tool for testing"
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<String> {
        Ok(self.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(name: &str) -> Arc<dyn Tool> {
        Arc::new(DummyTool {
            name: name.to_string(),
            result: "ok".to_string(),
        })
    }

    #[test]
    fn test_catalog_rejects_empty_list() {
        assert!(ToolCatalog::new(vec![]).is_err());
    }

    #[test]
    fn test_catalog_rejects_duplicate_names() {
        let result = ToolCatalog::new(vec![dummy("sql_tool"), dummy("sql_tool")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_catalog_lookup_and_definitions() {
        let catalog = ToolCatalog::new(vec![dummy("sql_tool"), dummy("document_tool")]).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("sql_tool").is_some());
        assert!(catalog.get("missing").is_none());

        let defs = catalog.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["document_tool", "sql_tool"]);
    }

    #[tokio::test]
    async fn test_dummy_tool_invoke() {
        let tool = DummyTool {
            name: "test_tool".to_string(),
            result: "success".to_string(),
        };
        let result = tool.invoke(&Map::new()).await.unwrap();
        assert_eq!(result, "success");
    }
}
