//! Natural-language-to-SQL engine over a SQLite table
//!
//! Translation happens in two steps: a completion model turns the
//! question into a single SELECT against the known schema, then the
//! statement runs read-only and the rows come back as text.

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Error;
use crate::reasoning::CompletionClient;
use crate::tools::QueryEngine;
use crate::Result;

const MAX_RESULT_ROWS: usize = 50;

const SQL_SYSTEM_PROMPT: &str = "\
You translate natural language questions into a single SQLite SELECT statement. \
Respond with the SQL statement only - no explanation, no code fences. \
Never produce INSERT, UPDATE, DELETE, or DDL statements.";

pub struct NlSqlEngine {
    conn: Arc<Mutex<Connection>>,
    table_name: String,
    schema: String,
    llm: Arc<dyn CompletionClient>,
}

impl NlSqlEngine {
    /// Open an existing database and introspect the target table.
    ///
    /// A missing file or unknown table is a configuration error at
    /// startup, not something to discover mid-conversation.
    pub fn open(
        db_path: &Path,
        table_name: &str,
        llm: Arc<dyn CompletionClient>,
    ) -> Result<Self> {
        if !db_path.exists() {
            return Err(Error::Config(format!(
                "database file not found: {}",
                db_path.display()
            )));
        }
        if !is_valid_identifier(table_name) {
            return Err(Error::Config(format!("invalid table name: {}", table_name)));
        }

        // Generated statements must never write; the connection enforces it.
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let schema = introspect_schema(&conn, table_name)?;
        if schema.is_empty() {
            return Err(Error::Config(format!("table not found: {}", table_name)));
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table_name: table_name.to_string(),
            schema,
            llm,
        })
    }

    /// Rendered "column (TYPE)" lines, one per column
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Row count of the target table, for the startup banner
    pub async fn row_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table_name),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    async fn translate(&self, query: &str) -> Result<String> {
        let prompt = format!(
            "Table: {}\nColumns:\n{}\nQuestion: {}\nSQL:",
            self.table_name, self.schema, query
        );
        let raw = self.llm.complete(SQL_SYSTEM_PROMPT, &prompt).await?;
        Ok(clean_sql(&raw))
    }
}

#[async_trait]
impl QueryEngine for NlSqlEngine {
    async fn query(&self, query: &str) -> Result<String> {
        let sql = self.translate(query).await?;
        debug!("generated SQL: {}", sql);

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        // SQLite's own analysis; catches writes hidden behind a leading WITH.
        if !stmt.readonly() {
            return Err(Error::Engine(format!(
                "refusing to run non-SELECT statement: {}",
                sql
            )));
        }
        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt.query([])?;
        let mut lines = vec![column_names.join(" | ")];
        let mut row_count = 0usize;
        let mut truncated = false;

        while let Some(row) = rows.next()? {
            if row_count >= MAX_RESULT_ROWS {
                truncated = true;
                break;
            }
            let values: Vec<String> = (0..column_names.len())
                .map(|i| render_value(row.get_ref(i)))
                .collect();
            lines.push(values.join(" | "));
            row_count += 1;
        }

        if row_count == 0 {
            return Ok("The query returned no rows.".to_string());
        }
        if truncated {
            lines.push(format!("... (showing first {} rows)", MAX_RESULT_ROWS));
        }
        Ok(lines.join("\n"))
    }
}

fn introspect_schema(conn: &Connection, table_name: &str) -> Result<String> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table_name))?;
    let columns = stmt.query_map([], |row| {
        let name: String = row.get(1)?;
        let kind: String = row.get(2)?;
        Ok(format!("  - {} ({})", name, kind))
    })?;

    let mut lines = Vec::new();
    for column in columns {
        lines.push(column?);
    }
    Ok(lines.join("\n"))
}

fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip code fences and trailing statements from a model reply
fn clean_sql(raw: &str) -> String {
    let mut sql = raw.trim();
    if let Some(stripped) = sql.strip_prefix("```sql") {
        sql = stripped;
    } else if let Some(stripped) = sql.strip_prefix("```") {
        sql = stripped;
    }
    if let Some(stripped) = sql.strip_suffix("```") {
        sql = stripped;
    }
    first_statement(sql.trim()).trim().to_string()
}

/// Slice up to the first `;` that sits outside a quoted literal.
/// Doubled quotes inside a literal toggle twice and cancel out.
fn first_statement(sql: &str) -> &str {
    let mut in_string = false;
    for (i, c) in sql.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            ';' if !in_string => return &sql[..i],
            _ => {}
        }
    }
    sql
}

fn render_value(value: rusqlite::Result<ValueRef<'_>>) -> String {
    match value {
        Ok(ValueRef::Null) => "NULL".to_string(),
        Ok(ValueRef::Integer(i)) => i.to_string(),
        Ok(ValueRef::Real(f)) => f.to_string(),
        Ok(ValueRef::Text(t)) => String::from_utf8_lossy(t).into_owned(),
        Ok(ValueRef::Blob(b)) => format!("<{} byte blob>", b.len()),
        Err(_) => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedCompletion {
        reply: String,
    }

    #[async_trait]
    impl CompletionClient for FixedCompletion {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    fn fixture_db(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("people.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE data (name TEXT, birthday TEXT, phone TEXT);
             INSERT INTO data VALUES ('Paula Walker', '1995-03-14', '555-1234');
             INSERT INTO data VALUES ('John Smith', '1988-07-02', '555-9876');",
        )
        .unwrap();
        path
    }

    fn engine(dir: &TempDir, reply: &str) -> NlSqlEngine {
        NlSqlEngine::open(
            &fixture_db(dir),
            "data",
            Arc::new(FixedCompletion {
                reply: reply.to_string(),
            }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_runs_generated_select() {
        let dir = TempDir::new().unwrap();
        let engine = engine(
            &dir,
            "SELECT birthday FROM data WHERE name = 'Paula Walker'",
        );

        let result = engine.query("What is the birthday of Paula Walker?").await.unwrap();
        assert!(result.contains("birthday"));
        assert!(result.contains("1995-03-14"));
    }

    #[tokio::test]
    async fn test_query_strips_code_fences() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, "```sql\nSELECT COUNT(*) FROM data;\n```");

        let result = engine.query("How many people are there?").await.unwrap();
        assert!(result.contains('2'));
    }

    #[tokio::test]
    async fn test_query_refuses_mutations() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, "DELETE FROM data");

        let err = engine.query("remove everyone").await.unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        assert_eq!(engine.row_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_refuses_with_prefixed_mutation() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, "WITH t AS (SELECT 1) DELETE FROM data");

        let err = engine.query("remove everyone").await.unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        assert_eq!(engine.row_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_keeps_semicolon_inside_literal() {
        let dir = TempDir::new().unwrap();
        let engine = engine(
            &dir,
            "SELECT name FROM data WHERE phone != 'a;b'; SELECT 2",
        );

        let result = engine.query("who has a phone").await.unwrap();
        assert!(result.contains("Paula Walker"));
        assert!(result.contains("John Smith"));
    }

    #[tokio::test]
    async fn test_query_with_no_rows() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, "SELECT * FROM data WHERE name = 'Nobody'");

        let result = engine.query("who is nobody").await.unwrap();
        assert_eq!(result, "The query returned no rows.");
    }

    #[test]
    fn test_open_rejects_missing_database() {
        let llm = Arc::new(FixedCompletion {
            reply: String::new(),
        });
        let result = NlSqlEngine::open(Path::new("/nonexistent/db.sqlite"), "data", llm);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_open_rejects_unknown_table() {
        let dir = TempDir::new().unwrap();
        let path = fixture_db(&dir);
        let llm = Arc::new(FixedCompletion {
            reply: String::new(),
        });
        let result = NlSqlEngine::open(&path, "missing", llm.clone());
        assert!(matches!(result, Err(Error::Config(_))));
        let result = NlSqlEngine::open(&path, "data; DROP TABLE data", llm);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_schema_introspection() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, "");
        assert!(engine.schema().contains("name (TEXT)"));
        assert!(engine.schema().contains("birthday (TEXT)"));
    }

    #[test]
    fn test_clean_sql_takes_first_statement() {
        assert_eq!(
            clean_sql("SELECT 1; SELECT 2;"),
            "SELECT 1"
        );
        assert_eq!(clean_sql("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(
            clean_sql("SELECT * FROM data WHERE name = 'a;b'"),
            "SELECT * FROM data WHERE name = 'a;b'"
        );
        assert_eq!(
            clean_sql("SELECT 'it''s;fine'; SELECT 2"),
            "SELECT 'it''s;fine'"
        );
    }
}
