//! OpenRouter reasoning client (OpenAI-compatible chat completions)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{CompletionClient, Decision, ReasoningClient, ToolCallRequest};
use crate::error::Error;
use crate::history::{Message, Role};
use crate::tools::ToolDefinition;
use crate::Result;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenRouter API client
#[derive(Clone)]
pub struct OpenRouterClient {
    api_key: String,
    model: String,
    client: Client,
}

impl OpenRouterClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => json!({"role": "system", "content": m.content}),
                Role::User => json!({"role": "user", "content": m.content}),
                Role::Assistant => {
                    let mut wire = json!({"role": "assistant", "content": m.content});
                    // Assistant messages that requested tools must carry the
                    // original tool_calls block for the API to accept the
                    // tool responses that follow.
                    if let Some(tool_calls) = m.metadata.get("tool_calls") {
                        wire["tool_calls"] = tool_calls.clone();
                    }
                    wire
                }
                Role::Tool => json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id().unwrap_or("unknown"),
                    "name": m.name.as_deref().unwrap_or("unknown"),
                    "content": m.content,
                }),
            })
            .collect()
    }

    fn convert_tools(&self, catalog: &[ToolDefinition]) -> Vec<Value> {
        catalog
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    async fn chat(&self, request: Value) -> Result<ChatResponse> {
        let response = self
            .client
            .post(OPENROUTER_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Reasoning(format!(
                "OpenRouter API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ReasoningClient for OpenRouterClient {
    async fn decide(
        &self,
        history: &[Message],
        catalog: &[ToolDefinition],
        allow_parallel: bool,
    ) -> Result<Decision> {
        let mut request = json!({
            "model": self.model,
            "messages": self.convert_messages(history),
            "temperature": 0.1,
        });

        if !catalog.is_empty() {
            request["tools"] = Value::Array(self.convert_tools(catalog));
            request["parallel_tool_calls"] = Value::Bool(allow_parallel);
        }

        debug!("OpenRouter decide call: model={}", self.model);
        let response = self.chat(request).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Reasoning("no choices in response".to_string()))?;

        decision_from_wire(choice.message, allow_parallel)
    }
}

/// Turn a raw assistant reply into a workflow decision.
///
/// When parallel calls are disallowed but the provider returned several
/// anyway, both the request list and the tool_calls block stored in the
/// message metadata shrink to the first entry, so the next round's
/// history matches the single tool response that follows it.
fn decision_from_wire(mut wire: WireMessage, allow_parallel: bool) -> Result<Decision> {
    // Absence of tool calls is a valid direct answer, never an error here.
    let mut requests = extract_tool_requests(&wire, false)?;
    if !allow_parallel && requests.len() > 1 {
        // Some providers ignore parallel_tool_calls; keep the first.
        debug!("truncating {} parallel tool calls to 1", requests.len());
        requests.truncate(1);
        if let Some(ref mut tool_calls) = wire.tool_calls {
            tool_calls.truncate(1);
        }
    }

    let mut message = Message::assistant(wire.content.clone().unwrap_or_default());
    if let Some(ref tool_calls) = wire.tool_calls {
        message = message.with_metadata("tool_calls", serde_json::to_value(tool_calls)?);
    }

    if requests.is_empty() {
        Ok(Decision::FinalAnswer(message))
    } else {
        Ok(Decision::ToolRequests(message, requests))
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "temperature": 0.0,
        });

        let response = self.chat(request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Reasoning("empty completion response".to_string()))
    }
}

/// Pull structured tool requests out of a raw assistant message.
///
/// `error_on_no_call` controls whether an answer with no tool calls is
/// treated as a failure; the workflow path always passes `false` since
/// a direct answer is a valid outcome.
pub fn extract_tool_requests(
    message: &WireMessage,
    error_on_no_call: bool,
) -> Result<Vec<ToolCallRequest>> {
    let Some(ref tool_calls) = message.tool_calls else {
        if error_on_no_call {
            return Err(Error::Reasoning("expected a tool call, got none".to_string()));
        }
        return Ok(Vec::new());
    };

    let mut requests = Vec::with_capacity(tool_calls.len());
    for call in tool_calls {
        let arguments: Map<String, Value> = if call.function.arguments.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                Error::Reasoning(format!(
                    "malformed arguments for {}: {}",
                    call.function.name, e
                ))
            })?
        };
        requests.push(ToolCallRequest {
            call_id: call
                .id
                .clone()
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
            tool_name: call.function.name.clone(),
            arguments,
        });
    }

    if requests.is_empty() && error_on_no_call {
        return Err(Error::Reasoning("expected a tool call, got none".to_string()));
    }
    Ok(requests)
}

// OpenRouter API response types
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

/// Raw assistant message as returned by the API
#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub function: WireFunction,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireFunction {
    pub name: String,
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_message(json: Value) -> WireMessage {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_extract_no_tool_calls_not_an_error() {
        let msg = wire_message(json!({"content": "direct answer"}));
        let requests = extract_tool_requests(&msg, false).unwrap();
        assert!(requests.is_empty());
    }

    #[test]
    fn test_extract_no_tool_calls_with_error_flag() {
        let msg = wire_message(json!({"content": "direct answer"}));
        assert!(extract_tool_requests(&msg, true).is_err());
    }

    #[test]
    fn test_extract_tool_call_parses_arguments() {
        let msg = wire_message(json!({
            "content": null,
            "tool_calls": [{
                "id": "tc_9",
                "type": "function",
                "function": {
                    "name": "sql_tool",
                    "arguments": "{\"query\": \"birthday of Paula Walker\"}"
                }
            }]
        }));
        let requests = extract_tool_requests(&msg, false).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].call_id, "tc_9");
        assert_eq!(requests[0].tool_name, "sql_tool");
        assert_eq!(
            requests[0].arguments.get("query").and_then(Value::as_str),
            Some("birthday of Paula Walker")
        );
    }

    #[test]
    fn test_extract_tool_call_generates_missing_id() {
        let msg = wire_message(json!({
            "content": null,
            "tool_calls": [{
                "function": {"name": "document_tool", "arguments": ""}
            }]
        }));
        let requests = extract_tool_requests(&msg, false).unwrap();
        assert!(requests[0].call_id.starts_with("call_"));
        assert!(requests[0].arguments.is_empty());
    }

    #[test]
    fn test_extract_malformed_arguments() {
        let msg = wire_message(json!({
            "content": null,
            "tool_calls": [{
                "id": "tc_1",
                "function": {"name": "sql_tool", "arguments": "not json"}
            }]
        }));
        assert!(extract_tool_requests(&msg, false).is_err());
    }

    #[test]
    fn test_decision_truncates_metadata_with_requests() {
        let call = |id: &str| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": "sql_tool", "arguments": "{}"}
            })
        };
        let msg = wire_message(json!({
            "content": null,
            "tool_calls": [call("tc_1"), call("tc_2"), call("tc_3")]
        }));

        let decision = decision_from_wire(msg, false).unwrap();
        let Decision::ToolRequests(message, requests) = decision else {
            panic!("expected tool requests");
        };
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].call_id, "tc_1");

        // Stored metadata must describe exactly the calls that will get
        // a tool response, or the API rejects the next round's history.
        let stored = message.metadata.get("tool_calls").unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 1);
        assert_eq!(stored[0]["id"], "tc_1");
    }

    #[test]
    fn test_decision_keeps_parallel_calls_when_allowed() {
        let msg = wire_message(json!({
            "content": null,
            "tool_calls": [
                {"id": "tc_1", "function": {"name": "sql_tool", "arguments": "{}"}},
                {"id": "tc_2", "function": {"name": "document_tool", "arguments": "{}"}}
            ]
        }));

        let Decision::ToolRequests(message, requests) =
            decision_from_wire(msg, true).unwrap()
        else {
            panic!("expected tool requests");
        };
        assert_eq!(requests.len(), 2);
        let stored = message.metadata.get("tool_calls").unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_convert_messages_round_trips_tool_metadata() {
        let client = OpenRouterClient::new("key", "test-model");
        let tool_calls = json!([{
            "id": "tc_1",
            "type": "function",
            "function": {"name": "sql_tool", "arguments": "{}"}
        }]);
        let messages = vec![
            Message::system("guidelines"),
            Message::user("question"),
            Message::assistant("").with_metadata("tool_calls", tool_calls.clone()),
            Message::tool_result("tc_1", "sql_tool", "result"),
        ];

        let wire = client.convert_messages(&messages);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[2]["tool_calls"], tool_calls);
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "tc_1");
        assert_eq!(wire[3]["name"], "sql_tool");
    }
}
