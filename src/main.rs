//! qrouter CLI entry point

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use qrouter::config::{WorkflowConfig, DEFAULT_MAX_ROUNDS, DEFAULT_QUERY_TIMEOUT};
use qrouter::engines::{DocumentStore, NlSqlEngine};
use qrouter::history::Role;
use qrouter::reasoning::OpenRouterClient;
use qrouter::tools::{DocumentTool, SqlTool, Tool};
use qrouter::ui;
use qrouter::workflow::RouterWorkflow;

const TIMEOUT_ANSWER: &str = "Query timed out. Please try a simpler question.";

#[derive(Parser)]
#[command(name = "qrouter")]
#[command(about = "🔀 qrouter - hybrid SQL + document question answering")]
#[command(version)]
struct Cli {
    /// Path to the SQLite database with structured data
    #[arg(long)]
    db: PathBuf,

    /// Table to query inside the database
    #[arg(long, default_value = "data")]
    table: String,

    /// Directory of .txt/.md documents
    #[arg(long)]
    docs: PathBuf,

    /// OpenRouter model id
    #[arg(long, default_value = "anthropic/claude-3.5-sonnet")]
    model: String,

    /// Single question to ask (interactive mode if omitted)
    #[arg(short, long)]
    message: Option<String>,

    /// Cap on reasoning rounds per query
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    max_rounds: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qrouter=debug"))
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let exit_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let r = exit_flag.clone();
    ctrlc::set_handler(move || {
        if r.load(std::sync::atomic::Ordering::SeqCst) {
            println!("\n👋 Bye!");
            std::process::exit(0);
        } else {
            println!("\n⚠  Press Ctrl+C again to exit");
            r.store(true, std::sync::atomic::Ordering::SeqCst);
            let r2 = r.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_secs(3));
                r2.store(false, std::sync::atomic::Ordering::SeqCst);
            });
        }
    })
    .ok();

    if let Err(e) = run(cli).await {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let api_key = std::env::var("OPENROUTER_API_KEY")
        .context("OPENROUTER_API_KEY is not set")?;
    let client = Arc::new(OpenRouterClient::new(&api_key, &cli.model));

    ui::print_header(&cli.model);

    ui::print_step("Connecting to database...");
    let sql_engine = Arc::new(NlSqlEngine::open(&cli.db, &cli.table, client.clone())?);
    ui::print_success(&format!(
        "Table '{}' with {} rows",
        sql_engine.table_name(),
        sql_engine.row_count().await?
    ));
    println!("{}", sql_engine.schema());

    ui::print_step("Loading documents...");
    let doc_store = Arc::new(DocumentStore::load(&cli.docs, client.clone())?);
    ui::print_success(&format!("{} document(s) indexed", doc_store.source_count()));

    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(SqlTool::new(
            sql_engine.clone(),
            sql_engine.table_name(),
            sql_engine.schema(),
        )),
        Arc::new(DocumentTool::new(doc_store)),
    ];
    let config = WorkflowConfig::new(client, tools).with_max_rounds(cli.max_rounds);
    let mut workflow = RouterWorkflow::new(config)?;

    if let Some(message) = cli.message {
        let answer = run_query(&mut workflow, &message).await;
        ui::print_tools_used(&tools_used(&workflow));
        println!("\n{}", answer);
        return Ok(());
    }

    println!("\n💬 Interactive mode. Type your questions; 'quit', 'exit', or 'q' to stop.");
    let stdin = io::stdin();
    loop {
        print!("\n❓ ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("👋 Bye!");
            break;
        }

        let answer = run_query(&mut workflow, input).await;
        ui::print_tools_used(&tools_used(&workflow));
        println!("\n{}\n", answer);
    }

    Ok(())
}

/// Run one query turn under the recommended wall-clock timeout.
async fn run_query(workflow: &mut RouterWorkflow, message: &str) -> String {
    match tokio::time::timeout(DEFAULT_QUERY_TIMEOUT, workflow.run(message)).await {
        Ok(answer) => answer,
        Err(_) => {
            ui::print_warning("query timed out");
            TIMEOUT_ANSWER.to_string()
        }
    }
}

/// Tool names that produced a successful result this conversation,
/// first-seen order, error/cancelled results filtered out.
fn tools_used(workflow: &RouterWorkflow) -> Vec<String> {
    let mut seen = Vec::new();
    for msg in workflow.history().messages() {
        if msg.role != Role::Tool {
            continue;
        }
        if msg.metadata.get("status").and_then(Value::as_str) != Some("ok") {
            continue;
        }
        if let Some(name) = msg.name.as_deref() {
            if !seen.iter().any(|s| s == name) {
                seen.push(name.to_string());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrouter::reasoning::FakeReasoningClient;
    use qrouter::tools::DummyTool;

    #[test]
    fn test_cli_parses_verbose_flag() {
        let cli = Cli::try_parse_from(["qrouter", "--db", "x.sqlite", "--docs", "d", "-v"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.table, "data");
        assert_eq!(cli.max_rounds, DEFAULT_MAX_ROUNDS);

        let cli = Cli::try_parse_from(["qrouter", "--db", "x.sqlite", "--docs", "d"]).unwrap();
        assert!(!cli.verbose);
    }

    #[tokio::test]
    async fn test_tools_used_reports_successful_calls_once() {
        let reasoning = Arc::new(FakeReasoningClient::new(vec![
            FakeReasoningClient::call("tc_1", "lookup", "first"),
            FakeReasoningClient::call("tc_2", "lookup", "second"),
            FakeReasoningClient::call("tc_3", "missing", "third"),
            FakeReasoningClient::answer("done"),
        ]));
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(DummyTool {
            name: "lookup".to_string(),
            result: "ok".to_string(),
        })];
        let mut workflow = RouterWorkflow::new(WorkflowConfig::new(reasoning, tools)).unwrap();

        let answer = workflow.run("question").await;
        assert_eq!(answer, "done");
        // Deduped, and the unknown-tool error result is filtered out.
        assert_eq!(tools_used(&workflow), vec!["lookup".to_string()]);
    }
}
