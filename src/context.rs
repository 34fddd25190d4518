//! The conversation context sent to the LLM: messages, tool catalogue, and
//! tool-choice policy (spec §3 "LLMContext" / "ToolDefinition").

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Who sent a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    /// Developer-authored instructions, distinct from end-user `system`
    /// prompts in providers that separate the two (spec §3).
    Developer,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Developer => write!(f, "developer"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call carried on an assistant [`Message`], assembled from streaming
/// chunks by the response assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function_name: String,
    /// Raw JSON-encoded argument string, as received from the model.
    pub arguments: String,
}

/// A message in an [`LLMContext`]. Plain text for most roles; a `tool`
/// message instead carries the call id it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Only populated on `assistant` messages that request tool execution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Only populated on `tool` messages: the call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// How the model should be steered toward (or away from) tool use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function { name: String },
}

/// A value returned by a tool handler: either a ready value or a future
/// that resolves to one. Spec §3: "handler result may be synchronous or an
/// awaitable channel; the dispatcher awaits either uniformly."
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A tool's executable behavior. Implementations may run synchronously
/// (return immediately ready) or do real async work; the dispatcher treats
/// both uniformly by awaiting the returned future either way.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value>;
}

/// Adapts a plain closure into a [`ToolHandler`] for the common synchronous
/// case, mirroring how the teacher's tool registry wraps closures.
pub struct FnHandler<F>(pub F)
where
    F: Fn(Value) -> Result<Value> + Send + Sync;

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync,
{
    async fn call(&self, args: Value) -> Result<Value> {
        (self.0)(args)
    }
}

/// Where control should transition to after a tool call, optionally
/// computed from the call's arguments.
#[derive(Clone)]
pub enum TransitionTarget {
    Name(String),
    Dynamic(Arc<dyn Fn(&Value) -> String + Send + Sync>),
}

impl fmt::Debug for TransitionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => f.debug_tuple("Name").field(n).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// One entry in an [`LLMContext`]'s tool catalogue (spec §3 "ToolDefinition").
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-Schema-shaped parameter description; never validated by this
    /// crate, only forwarded to the model and (loosely) to the dispatcher.
    pub parameters: Value,
    pub handler: Arc<dyn ToolHandler>,
    /// Invoked with the parsed arguments after the handler returns, before
    /// the result frame is emitted.
    pub transition_cb: Option<Arc<dyn Fn(&Value) + Send + Sync>>,
    pub transition_to: Option<TransitionTarget>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("transition_to", &self.transition_to)
            .finish_non_exhaustive()
    }
}

// Handlers aren't comparable; two tool definitions are treated as equal
// when their declared shape (not behavior) matches.
impl PartialEq for ToolDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.parameters == other.parameters
    }
}

/// The full state sent to the model: message history, tool catalogue, and
/// tool-choice policy (spec §3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LLMContext {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
}

impl LLMContext {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    pub fn find_tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }
}

/// Append `text` under `role` to `messages`, merging with the last message
/// if it shares the same role (spec §3 invariant and §4.5 merge rule):
/// `concat-messages` is associative and idempotent under equal-role
/// merging.
pub fn concat_messages(mut messages: Vec<Message>, role: Role, text: &str) -> Vec<Message> {
    if text.is_empty() {
        return messages;
    }
    match messages.last_mut() {
        Some(last) if last.role == role => {
            last.content = format!("{} {}", last.content, text);
        }
        _ => messages.push(Message::new(role, text)),
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_messages_appends_new_role() {
        let messages = vec![Message::system("You are helpful")];
        let out = concat_messages(messages, Role::User, "hi");
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].role, Role::User);
        assert_eq!(out[1].content, "hi");
    }

    #[test]
    fn concat_messages_merges_same_role() {
        let messages = vec![Message::user("a")];
        let out = concat_messages(messages, Role::User, "b");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "a b");
    }

    #[test]
    fn concat_messages_is_associative_for_same_role_chain() {
        let left = concat_messages(
            concat_messages(vec![Message::user("a")], Role::User, "b"),
            Role::User,
            "c",
        );
        let right = concat_messages(vec![Message::user("a")], Role::User, "b c");
        assert_eq!(left, right);
    }

    #[test]
    fn concat_messages_is_idempotent_on_empty_text() {
        let messages = vec![Message::user("a")];
        let out = concat_messages(messages.clone(), Role::User, "");
        assert_eq!(out, messages);
    }

    #[test]
    fn find_tool_looks_up_by_name() {
        let handler: Arc<dyn ToolHandler> = Arc::new(FnHandler(|_| Ok(Value::Null)));
        let ctx = LLMContext {
            messages: Vec::new(),
            tools: vec![ToolDefinition {
                name: "get_weather".into(),
                description: "".into(),
                parameters: Value::Null,
                handler,
                transition_cb: None,
                transition_to: None,
            }],
            tool_choice: None,
        };
        assert!(ctx.find_tool("get_weather").is_some());
        assert!(ctx.find_tool("missing").is_none());
    }
}
