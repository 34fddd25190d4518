//! Payload types for each frame in the closed taxonomy (spec §3).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single message in an [`crate::context::LLMContext`]. Re-exported here so
/// frame payloads that carry messages don't need a second import path.
pub use crate::context::Message;
use crate::context::ToolDefinition;

/// Raw PCM audio plus its sample rate, used where the taxonomy names a
/// `{audio, sample-rate}` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub audio: Vec<u8>,
    pub sample_rate: u32,
}

/// One fragment of a streaming tool call, keyed by its index in the
/// `tool_calls` array (OpenAI-style streaming shape, spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallChunk {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_arguments: Option<String>,
}

/// A closure invoked by the aggregator after a `llm-tool-call-result` or
/// `llm-context-messages-append` is processed (spec §4.5). Frames must
/// remain `Send` to cross channels, so the callback is boxed behind an
/// `Arc` and given a hand-written `Debug` impl.
#[derive(Clone)]
pub struct OnUpdateCallback(pub Arc<dyn Fn(&Value) + Send + Sync>);

impl fmt::Debug for OnUpdateCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OnUpdateCallback(..)")
    }
}

impl PartialEq for OnUpdateCallback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Properties attached to an `llm-context-messages-append` frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppendProperties {
    pub run_llm: Option<bool>,
    pub tool_call: Option<bool>,
    pub on_update: Option<OnUpdateCallback>,
}

/// Properties attached to an `llm-tool-call-result` frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResultProperties {
    pub run_llm: bool,
    pub on_update: Option<OnUpdateCallback>,
}

/// Payload of a `llm-context` frame: a full, replaceable conversation state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPayload {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<crate::context::ToolChoice>,
}

/// Payload of a `llm-context-messages-append` frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagesAppend {
    pub messages: Vec<Message>,
    pub properties: AppendProperties,
}

/// Payload shared by `llm-tools-replace` and the aggregator's internal
/// `scenario-context-update` handling (spec §4.5): replace the tool
/// catalogue, append messages, optionally re-invoke the LLM.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolsReplace {
    pub tools: Vec<ToolDefinition>,
    pub messages: Vec<Message>,
    pub properties: AppendProperties,
}

/// Payload of `llm-tool-call-request`: a fully assembled assistant message
/// whose `tool_calls` the dispatcher should act on.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub message: Message,
}

/// Payload of `llm-tool-call-result`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub request: Message,
    pub result: Value,
    pub properties: ToolResultProperties,
}

/// Payload of `system-config-change`: a free-form patch keyed by dotted
/// path (e.g. `"twilio/stream-sid"`, `"transport/serializer"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch(pub Value);

impl ConfigPatch {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}
