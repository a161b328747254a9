//! Router workflow — the tool-routing conversation state machine
//!
//! One turn walks: PreparingTurn → Reasoning → (StopWithAnswer |
//! DispatchingTools → AwaitingToolResults → FoldingResults → Reasoning
//! ...). Tool calls within a round run concurrently and their results
//! are folded into history in completion order; the loop ends when the
//! reasoning client answers without requesting tools.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::history::{ChatHistory, Message};
use crate::reasoning::{Decision, ReasoningClient, ToolCallRequest};
use crate::tools::{Tool, ToolCatalog, ToolDefinition};
use crate::Result;

/// Answer used when the reasoning call itself fails.
pub const REASONING_APOLOGY: &str =
    "I encountered an issue processing your request. Please try rephrasing your question.";

/// Answer used when the gather step cannot account for every dispatched call.
pub const GATHER_APOLOGY: &str =
    "I encountered an issue processing the tool responses. Please try again.";

/// Answer used when the round cap is hit before a final answer.
pub const ROUND_CAP_ANSWER: &str =
    "I wasn't able to finish answering within the allowed number of tool rounds. \
     Please try a simpler question.";

/// Content of a result whose call was interrupted before it reported.
pub const CANCELLED_CONTENT: &str = "Tool execution was cancelled";

const GUIDELINES: &str = "\
IMPORTANT GUIDELINES:
- When a user asks about a specific person's information (name, birthday, phone, email, address), use ONLY the sql_tool
- When they ask about policies, procedures, or general information from documents, use ONLY the document_tool
- Make ONE targeted tool call per query - do not make multiple calls to the same tool
- Choose the most appropriate single tool based on the question type
- For mixed queries (e.g., 'terms and conditions AND phone owner'), make separate tool calls for each part";

/// Terminal status of one dispatched tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Ok,
    Cancelled,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ok => "ok",
            CallStatus::Cancelled => "cancelled",
            CallStatus::Error => "error",
        }
    }
}

/// Outcome of one dispatched tool call; exactly one is produced per
/// [`ToolCallRequest`] in a round.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub status: CallStatus,
}

impl ToolCallResult {
    /// Turn the result into the tool-role history message
    pub fn into_message(self) -> Message {
        Message::tool_result(self.call_id, self.tool_name, self.content)
            .with_metadata("status", Value::String(self.status.as_str().to_string()))
    }
}

/// Workflow states. `AwaitingToolResults` owns the receiving end of the
/// per-round result channel; `StopWithAnswer` is the only terminal state.
enum State {
    PreparingTurn(String),
    Reasoning,
    DispatchingTools(Vec<ToolCallRequest>),
    AwaitingToolResults {
        outstanding: Vec<(String, String)>,
        rx: mpsc::Receiver<ToolCallResult>,
    },
    FoldingResults(Vec<ToolCallResult>),
    StopWithAnswer(String),
}

/// The router workflow session: chat history, tool catalog, reasoning
/// client, and the in-flight bookkeeping for one conversation.
///
/// History is exclusively owned by this instance. The catalog is
/// immutable after construction.
pub struct RouterWorkflow {
    reasoning: Arc<dyn ReasoningClient>,
    catalog: ToolCatalog,
    definitions: Vec<ToolDefinition>,
    system_prompt: String,
    history: ChatHistory,
    pending_call_count: usize,
    max_rounds: usize,
}

impl RouterWorkflow {
    /// Build a workflow from an explicit configuration.
    ///
    /// Configuration problems (empty catalog, duplicate tool names,
    /// zero round cap) fail here, never inside `run`.
    pub fn new(config: WorkflowConfig) -> Result<Self> {
        if config.max_rounds == 0 {
            return Err(crate::error::Error::Config(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        let catalog = ToolCatalog::new(config.tools)?;
        let definitions = catalog.definitions();
        let system_prompt = build_system_prompt(&definitions);

        Ok(Self {
            reasoning: config.reasoning,
            catalog,
            definitions,
            system_prompt,
            history: ChatHistory::new(),
            pending_call_count: 0,
            max_rounds: config.max_rounds,
        })
    }

    /// Clear the conversation for a fresh start
    pub fn reset(&mut self) {
        self.history.clear();
        self.pending_call_count = 0;
    }

    /// The conversation so far (for presentation by the caller)
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Number of tool calls dispatched and not yet folded
    pub fn pending_call_count(&self) -> usize {
        self.pending_call_count
    }

    /// Run one query turn to completion.
    ///
    /// Always returns text: internal failures degrade to fixed apology
    /// answers rather than propagating as errors.
    pub async fn run(&mut self, message: &str) -> String {
        // Size-based truncation happens between turns, never mid-turn.
        self.history.truncate();

        let mut rounds_used = 0usize;
        let mut state = State::PreparingTurn(message.to_string());

        loop {
            state = match state {
                State::PreparingTurn(message) => self.prepare_turn(message),
                State::Reasoning => {
                    if rounds_used >= self.max_rounds {
                        warn!("round cap of {} reached without an answer", self.max_rounds);
                        State::StopWithAnswer(ROUND_CAP_ANSWER.to_string())
                    } else {
                        rounds_used += 1;
                        self.reason().await
                    }
                }
                State::DispatchingTools(requests) => self.dispatch(requests),
                State::AwaitingToolResults { outstanding, rx } => {
                    self.gather(outstanding, rx).await
                }
                State::FoldingResults(results) => self.fold(results),
                State::StopWithAnswer(answer) => {
                    info!("turn finished after {} reasoning round(s)", rounds_used);
                    return answer;
                }
            };
        }
    }

    /// PreparingTurn: seed the system message on first use, append the
    /// user query.
    fn prepare_turn(&mut self, message: String) -> State {
        if self.history.is_empty() {
            self.history.push(Message::system(self.system_prompt.clone()));
        }
        self.history.push(Message::user(message));
        State::Reasoning
    }

    /// Reasoning: ask the client for the next action. The assistant
    /// message is appended unconditionally so later rounds keep the
    /// model's intermediate tool-selection context.
    async fn reason(&mut self) -> State {
        let decision = self
            .reasoning
            .decide(self.history.messages(), &self.definitions, false)
            .await;

        match decision {
            Ok(decision) => {
                self.history.push(decision.message().clone());
                match decision {
                    Decision::FinalAnswer(message) => State::StopWithAnswer(message.content),
                    Decision::ToolRequests(message, requests) => {
                        if requests.is_empty() {
                            return State::StopWithAnswer(message.content);
                        }
                        info!("reasoning requested {} tool call(s)", requests.len());
                        State::DispatchingTools(requests)
                    }
                }
            }
            Err(e) => {
                warn!("reasoning call failed: {}", e);
                State::StopWithAnswer(REASONING_APOLOGY.to_string())
            }
        }
    }

    /// DispatchingTools: launch every requested call concurrently. Each
    /// call is its own failure domain and reports exactly one result
    /// through the round's channel.
    fn dispatch(&mut self, requests: Vec<ToolCallRequest>) -> State {
        self.pending_call_count = requests.len();
        let (tx, rx) = mpsc::channel(requests.len());

        let outstanding = requests
            .iter()
            .map(|r| (r.call_id.clone(), r.tool_name.clone()))
            .collect();

        for request in requests {
            let tool = self.catalog.get(&request.tool_name);
            let tx = tx.clone();
            tokio::spawn(async move {
                let call_id = request.call_id.clone();
                let tool_name = request.tool_name.clone();
                let result = AssertUnwindSafe(execute_call(tool, request))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| ToolCallResult {
                        call_id,
                        tool_name: tool_name.clone(),
                        content: format!("Error executing {}: tool panicked", tool_name),
                        status: CallStatus::Error,
                    });
                // The receiver only goes away if the whole turn was
                // abandoned, in which case the result is moot.
                let _ = tx.send(result).await;
            });
        }

        State::AwaitingToolResults { outstanding, rx }
    }

    /// AwaitingToolResults: suspend until exactly `pending_call_count`
    /// results arrived. A call that vanished without reporting (aborted
    /// task) is accounted for with a cancelled result so the count
    /// invariant still holds.
    async fn gather(
        &mut self,
        mut outstanding: Vec<(String, String)>,
        mut rx: mpsc::Receiver<ToolCallResult>,
    ) -> State {
        let mut results = Vec::with_capacity(self.pending_call_count);

        while results.len() < self.pending_call_count {
            match rx.recv().await {
                Some(result) => {
                    debug!("tool {} finished: {}", result.tool_name, result.status.as_str());
                    outstanding.retain(|(call_id, _)| call_id != &result.call_id);
                    results.push(result);
                }
                None => {
                    for (call_id, tool_name) in outstanding.drain(..) {
                        warn!("tool call {} ({}) was cancelled", call_id, tool_name);
                        results.push(ToolCallResult {
                            call_id,
                            tool_name,
                            content: CANCELLED_CONTENT.to_string(),
                            status: CallStatus::Cancelled,
                        });
                    }
                    break;
                }
            }
        }

        if results.len() != self.pending_call_count {
            warn!(
                "gather expected {} results, got {}",
                self.pending_call_count,
                results.len()
            );
            self.pending_call_count = 0;
            return State::StopWithAnswer(GATHER_APOLOGY.to_string());
        }

        State::FoldingResults(results)
    }

    /// FoldingResults: append the buffered tool messages to history in
    /// completion order and loop back to reasoning.
    fn fold(&mut self, results: Vec<ToolCallResult>) -> State {
        for result in results {
            self.history.push(result.into_message());
        }
        self.pending_call_count = 0;
        State::Reasoning
    }
}

/// Execute one tool call, mapping every failure into the result rather
/// than letting it escape.
async fn execute_call(tool: Option<Arc<dyn Tool>>, request: ToolCallRequest) -> ToolCallResult {
    let Some(tool) = tool else {
        return ToolCallResult {
            content: format!("Error executing {}: unknown tool", request.tool_name),
            status: CallStatus::Error,
            call_id: request.call_id,
            tool_name: request.tool_name,
        };
    };

    match tool.invoke(&request.arguments).await {
        Ok(content) => ToolCallResult {
            call_id: request.call_id,
            tool_name: request.tool_name,
            content,
            status: CallStatus::Ok,
        },
        Err(e) => ToolCallResult {
            content: format!("Error executing {}: {}", request.tool_name, e),
            status: CallStatus::Error,
            call_id: request.call_id,
            tool_name: request.tool_name,
        },
    }
}

/// The fixed tool-selection system message, built once per catalog.
fn build_system_prompt(definitions: &[ToolDefinition]) -> String {
    let mut prompt =
        String::from("You are an intelligent assistant with access to these specialized tools:\n\n");
    for (i, def) in definitions.iter().enumerate() {
        let summary = def.description.lines().next().unwrap_or(def.name.as_str());
        prompt.push_str(&format!("{}. {}: {}\n", i + 1, def.name, summary));
    }
    prompt.push('\n');
    prompt.push_str(GUIDELINES);
    prompt
}
