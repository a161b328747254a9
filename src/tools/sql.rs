//! Structured-query tool adapter

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::{query_argument, QueryEngine, Tool};
use crate::Result;

/// Adapter exposing a structured store behind the `sql_tool` name.
///
/// The description enumerates the column schema and gives examples on
/// both sides of the sql/document boundary; misrouting between the two
/// tools is the primary failure mode, so the wording here matters.
pub struct SqlTool {
    engine: Arc<dyn QueryEngine>,
    description: String,
}

impl SqlTool {
    pub fn new(engine: Arc<dyn QueryEngine>, table_name: &str, schema: &str) -> Self {
        let description = format!(
            "Use this tool to query structured data from the '{table_name}' table. \
             This contains student/person data with the following information:\n\
             Available columns:\n{schema}\n\
             Use this tool for:\n\
             - Finding specific people by name (e.g., 'Paula Walker', 'John Smith')\n\
             - Getting personal details like birthdays, phone numbers, emails, addresses\n\
             - Filtering data by criteria (age, location, etc.)\n\
             - Statistical queries and data analysis\n\n\
             Do NOT use this tool for policies, procedures, or other document \
             content (use document_tool instead).\n\n\
             Examples of queries for this tool:\n\
             - 'What is the birthday of Paula Walker?'\n\
             - 'Find all students from California'\n\
             - 'How many people are in the database?'"
        );
        Self {
            engine,
            description,
        }
    }
}

#[async_trait]
impl Tool for SqlTool {
    fn name(&self) -> &str {
        "sql_tool"
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String> {
        let query = query_argument(arguments)?;
        debug!("sql_tool query: {}", query);
        self.engine.query(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    struct EchoEngine;

    #[async_trait]
    impl QueryEngine for EchoEngine {
        async fn query(&self, query: &str) -> Result<String> {
            Ok(format!("rows for: {}", query))
        }
    }

    #[tokio::test]
    async fn test_sql_tool_forwards_query() {
        let tool = SqlTool::new(Arc::new(EchoEngine), "data", "  - name (TEXT)\n");
        let mut args = Map::new();
        args.insert("query".to_string(), json!("birthday of Paula Walker"));

        let result = tool.invoke(&args).await.unwrap();
        assert_eq!(result, "rows for: birthday of Paula Walker");
        assert_eq!(tool.name(), "sql_tool");
        assert!(tool.description().contains("'data' table"));
    }

    #[tokio::test]
    async fn test_sql_tool_missing_argument() {
        let tool = SqlTool::new(Arc::new(EchoEngine), "data", "");
        let err = tool.invoke(&Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }
}
