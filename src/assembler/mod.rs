//! Assistant-response assembler: reassembles streaming text and tool-call
//! chunks into a single assistant [`Message`] (spec §4.6).

use async_trait::async_trait;
use serde_json::Value;

use crate::context::{Message, ToolCall};
use crate::error::Result;
use crate::frame::types::{AppendProperties, MessagesAppend};
use crate::frame::{Frame, FramePayload};
use crate::processor::{Descriptor, Outputs, Phase, Processor, Workload};

/// Accumulates one assistant turn's worth of streaming chunks. Reset on
/// every `llm-full-response-start` (spec §4.6).
#[derive(Debug, Default)]
pub struct AssistantResponseAssembler {
    content_aggregation: String,
    function_name: Option<String>,
    function_arguments: String,
    tool_call_id: Option<String>,
}

impl AssistantResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.content_aggregation.clear();
        self.function_name = None;
        self.function_arguments.clear();
        self.tool_call_id = None;
    }

    fn on_text_chunk(&mut self, chunk: &str) {
        self.content_aggregation.push_str(chunk);
    }

    fn on_tool_call_chunk(
        &mut self,
        name: Option<&str>,
        arguments: Option<&str>,
        id: Option<&str>,
    ) {
        if self.function_name.is_none() {
            if let Some(name) = name {
                self.function_name = Some(name.to_string());
            }
        }
        if let Some(arguments) = arguments {
            self.function_arguments.push_str(arguments);
        }
        if self.tool_call_id.is_none() {
            if let Some(id) = id {
                self.tool_call_id = Some(id.to_string());
            }
        }
    }

    /// Build the single assistant message and the append-frame payload that
    /// folds it into the context (spec §4.6 `llm-full-response-end`).
    fn build_append(&mut self) -> MessagesAppend {
        let is_tool_call = self.function_name.is_some();
        let message = if let Some(name) = self.function_name.clone() {
            Message::assistant_tool_calls(vec![ToolCall {
                id: self.tool_call_id.clone().unwrap_or_default(),
                function_name: name,
                arguments: self.function_arguments.clone(),
            }])
        } else {
            Message::assistant(self.content_aggregation.clone())
        };
        self.reset();
        MessagesAppend {
            messages: vec![message],
            properties: AppendProperties {
                run_llm: Some(false),
                tool_call: Some(is_tool_call),
                on_update: None,
            },
        }
    }
}

#[async_trait]
impl Processor for AssistantResponseAssembler {
    fn describe(&self) -> Descriptor {
        Descriptor::new()
            .with_in("in", "llm-full-response-start/end, llm-text-chunk, llm-tool-call-chunk")
            .with_out("out", "llm-context-messages-append")
            .with_workload(Workload::Compute)
    }

    async fn init(&mut self, _params: Value) -> Result<()> {
        Ok(())
    }

    async fn transition(&mut self, _phase: Phase) -> Result<()> {
        Ok(())
    }

    fn transform(&mut self, _port: &str, frame: Frame) -> Outputs {
        let mut out = Outputs::new();
        match frame.payload {
            FramePayload::LlmFullResponseStart => self.reset(),
            FramePayload::LlmTextChunk(chunk) => self.on_text_chunk(&chunk),
            FramePayload::LlmToolCallChunk(tc) => self.on_tool_call_chunk(
                tc.function_name.as_deref(),
                tc.function_arguments.as_deref(),
                tc.id.as_deref(),
            ),
            FramePayload::LlmFullResponseEnd => {
                let append = self.build_append();
                out.emit(Frame::llm_context_messages_append(append));
            }
            _ => {}
        }
        out
    }
}
