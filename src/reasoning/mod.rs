//! Reasoning client — the decision-making engine behind the router.
//!
//! Given the conversation history and the tool catalog, a reasoning
//! client either produces a final textual answer or requests one or
//! more tool invocations for the workflow to dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::history::Message;
use crate::tools::ToolDefinition;
use crate::Result;

pub mod openrouter;

pub use openrouter::OpenRouterClient;

/// A tool invocation requested by the reasoning client.
///
/// Produced once per reasoning round, consumed exactly once by dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique id tying the eventual result back to this request
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

/// Outcome of one reasoning step.
///
/// Both arms carry the assistant [`Message`] so the workflow can append
/// it to history unconditionally, keeping the model's intermediate
/// tool-selection text available as context in later rounds.
#[derive(Debug, Clone)]
pub enum Decision {
    /// The model answered directly; the turn is over.
    FinalAnswer(Message),
    /// The model wants tool output before answering.
    ToolRequests(Message, Vec<ToolCallRequest>),
}

impl Decision {
    /// The assistant message produced by this step
    pub fn message(&self) -> &Message {
        match self {
            Decision::FinalAnswer(msg) => msg,
            Decision::ToolRequests(msg, _) => msg,
        }
    }
}

/// Reasoning client trait — swappable model abstraction
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Ask the model for the next action given history and catalog.
    ///
    /// With `allow_parallel` false the returned decision carries at most
    /// one tool request; a query needing both tools is expected to play
    /// out over sequential rounds.
    async fn decide(
        &self,
        history: &[Message],
        catalog: &[ToolDefinition],
        allow_parallel: bool,
    ) -> Result<Decision>;
}

/// Plain text completion, used by query engines for translation and
/// synthesis prompts (no tool calling involved).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Fake reasoning client for testing — replays a scripted sequence of
/// decisions, one per `decide` call.
pub struct FakeReasoningClient {
    script: std::sync::Mutex<std::collections::VecDeque<Result<Decision>>>,
}

impl FakeReasoningClient {
    pub fn new(script: Vec<Result<Decision>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
        }
    }

    /// A scripted final answer step
    pub fn answer(text: &str) -> Result<Decision> {
        Ok(Decision::FinalAnswer(Message::assistant(text)))
    }

    /// A scripted single-tool request step
    pub fn call(call_id: &str, tool_name: &str, query: &str) -> Result<Decision> {
        let mut arguments = Map::new();
        arguments.insert("query".to_string(), Value::String(query.to_string()));
        Ok(Decision::ToolRequests(
            Message::assistant(""),
            vec![ToolCallRequest {
                call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
                arguments,
            }],
        ))
    }

    /// A scripted multi-tool request step
    pub fn calls(requests: Vec<(&str, &str, &str)>) -> Result<Decision> {
        let requests = requests
            .into_iter()
            .map(|(call_id, tool_name, query)| {
                let mut arguments = Map::new();
                arguments.insert("query".to_string(), Value::String(query.to_string()));
                ToolCallRequest {
                    call_id: call_id.to_string(),
                    tool_name: tool_name.to_string(),
                    arguments,
                }
            })
            .collect();
        Ok(Decision::ToolRequests(Message::assistant(""), requests))
    }

    /// A scripted failure of the reasoning call itself
    pub fn failure(text: &str) -> Result<Decision> {
        Err(crate::error::Error::Reasoning(text.to_string()))
    }
}

#[async_trait]
impl ReasoningClient for FakeReasoningClient {
    async fn decide(
        &self,
        _history: &[Message],
        _catalog: &[ToolDefinition],
        _allow_parallel: bool,
    ) -> Result<Decision> {
        let mut script = self.script.lock().unwrap();
        script
            .pop_front()
            .unwrap_or_else(|| Err(crate::error::Error::Reasoning("script exhausted".to_string())))
    }
}
