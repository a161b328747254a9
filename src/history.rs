//! Chat history types — role-tagged messages and the truncation policy

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Number of messages past which history is truncated before a new turn.
pub const MAX_HISTORY_MESSAGES: usize = 20;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation.
///
/// Ordering within a history is significant: it is the context the
/// reasoning client sees, and the truncation policy keys off position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Originating tool name (for tool responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Extra fields carried alongside the message, e.g. `tool_call_id`
    /// on tool responses or the raw `tool_calls` on assistant messages.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
            metadata: HashMap::new(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a tool result message tagged with its originating call
    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let tool_name = tool_name.into();
        let mut metadata = HashMap::new();
        metadata.insert("tool_call_id".to_string(), Value::String(call_id.into()));
        metadata.insert("tool_name".to_string(), Value::String(tool_name.clone()));
        Self {
            role: Role::Tool,
            content: content.into(),
            name: Some(tool_name),
            metadata,
        }
    }

    /// Attach a metadata field, builder-style
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The `tool_call_id` metadata field, if present
    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata.get("tool_call_id").and_then(Value::as_str)
    }
}

/// Ordered conversation history, exclusively owned by one workflow.
///
/// Append-only during a turn; the only destructive operations are
/// [`ChatHistory::clear`] and the pre-turn [`ChatHistory::truncate`].
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Apply the size-based truncation policy.
    ///
    /// Once the history grows past [`MAX_HISTORY_MESSAGES`], everything
    /// except a leading system message is dropped. Called by the owning
    /// session before a new turn starts, never mid-turn.
    pub fn truncate(&mut self) {
        if self.messages.len() <= MAX_HISTORY_MESSAGES {
            return;
        }
        let system = self
            .messages
            .first()
            .filter(|m| m.role == Role::System)
            .cloned();
        self.messages.clear();
        if let Some(system) = system {
            self.messages.push(system);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn test_tool_result_metadata() {
        let msg = Message::tool_result("tc_1", "sql_tool", "42 rows");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.name.as_deref(), Some("sql_tool"));
        assert_eq!(msg.tool_call_id(), Some("tc_1"));
        assert_eq!(
            msg.metadata.get("tool_name").and_then(Value::as_str),
            Some("sql_tool")
        );
    }

    #[test]
    fn test_truncate_below_threshold_is_noop() {
        let mut history = ChatHistory::new();
        history.push(Message::system("guidelines"));
        for i in 0..10 {
            history.push(Message::user(format!("q{}", i)));
        }
        history.truncate();
        assert_eq!(history.len(), 11);
    }

    #[test]
    fn test_truncate_keeps_leading_system_message() {
        let mut history = ChatHistory::new();
        history.push(Message::system("guidelines"));
        for i in 0..25 {
            history.push(Message::user(format!("q{}", i)));
        }
        history.truncate();
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0].role, Role::System);
    }

    #[test]
    fn test_truncate_without_system_message_empties_history() {
        let mut history = ChatHistory::new();
        for i in 0..25 {
            history.push(Message::user(format!("q{}", i)));
        }
        history.truncate();
        assert!(history.is_empty());
    }
}
