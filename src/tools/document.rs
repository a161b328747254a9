//! Document-query tool adapter

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::{query_argument, QueryEngine, Tool};
use crate::Result;

const DOCUMENT_TOOL_DESCRIPTION: &str = "\
Use this tool to search and analyze uploaded documents (PDFs, text files, etc.). \
This tool is for questions about:
- Policies, procedures, and guidelines
- Terms and conditions, privacy policies
- College/institutional information
- Conceptual explanations and qualitative content
- Any text-based content from uploaded documents

Do NOT use this tool for:
- Finding specific people's personal data (use sql_tool instead)
- Structured data queries about names, birthdays, phone numbers, etc.

Examples of queries for this tool:
- 'What is the privacy policy?'
- 'Tell me about the college principles'
- 'What are the terms and conditions?'";

/// Adapter exposing semantic retrieval + synthesis behind the
/// `document_tool` name.
pub struct DocumentTool {
    engine: Arc<dyn QueryEngine>,
}

impl DocumentTool {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for DocumentTool {
    fn name(&self) -> &str {
        "document_tool"
    }

    fn description(&self) -> &str {
        DOCUMENT_TOOL_DESCRIPTION
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String> {
        let query = query_argument(arguments)?;
        debug!("document_tool query: {}", query);
        self.engine.query(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoEngine;

    #[async_trait]
    impl QueryEngine for EchoEngine {
        async fn query(&self, query: &str) -> Result<String> {
            Ok(format!("passages for: {}", query))
        }
    }

    #[tokio::test]
    async fn test_document_tool_forwards_query() {
        let tool = DocumentTool::new(Arc::new(EchoEngine));
        let mut args = Map::new();
        args.insert("query".to_string(), json!("privacy policy"));

        let result = tool.invoke(&args).await.unwrap();
        assert_eq!(result, "passages for: privacy policy");
        assert_eq!(tool.name(), "document_tool");
        assert!(tool.description().contains("use sql_tool instead"));
    }
}
