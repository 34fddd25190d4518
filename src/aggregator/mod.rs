//! User-turn aggregator: interleaves VAD boundaries and noisy transcription
//! into one coherent user utterance, then folds it into the LLM context
//! (spec §4.5).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::context::{concat_messages, ContextPayload as Ctx, LLMContext, Message, Role, ToolCall};
use crate::error::Result;
use crate::frame::types::{ContextPayload, MessagesAppend, ToolCallResult, ToolsReplace};
use crate::frame::{Frame, FramePayload};
use crate::processor::{Descriptor, Outputs, Phase, Processor, Workload};
use crate::tools::run_dispatcher_worker;

pub struct UserTurnAggregator {
    aggregation: String,
    aggregating: bool,
    seen_start: bool,
    seen_end: bool,
    seen_interim: bool,
    context: LLMContext,
    tools_shared: Arc<Mutex<Vec<crate::context::ToolDefinition>>>,
    tool_write_tx: Option<mpsc::Sender<ToolCall>>,
    tool_read_rx: Option<mpsc::Receiver<Frame>>,
}

impl UserTurnAggregator {
    pub fn new(initial_context: LLMContext) -> Self {
        let tools_shared = Arc::new(Mutex::new(initial_context.tools.clone()));
        Self {
            aggregation: String::new(),
            aggregating: false,
            seen_start: false,
            seen_end: false,
            seen_interim: false,
            context: initial_context,
            tools_shared,
            tool_write_tx: None,
            tool_read_rx: None,
        }
    }

    fn context_payload(&self) -> ContextPayload {
        Ctx {
            messages: self.context.messages.clone(),
            tools: self.context.tools.clone(),
            tool_choice: self.context.tool_choice.clone(),
        }
    }

    fn emit_context(&mut self, out: &mut Outputs) {
        let text = self.aggregation.trim().to_string();
        self.context.messages =
            concat_messages(std::mem::take(&mut self.context.messages), Role::User, &text);
        out.emit(Frame::llm_context(self.context_payload()));
    }

    fn reset_turn(&mut self) {
        self.aggregation.clear();
        self.aggregating = false;
        self.seen_start = false;
        self.seen_end = false;
        self.seen_interim = false;
    }

    fn append_transcript(&mut self, trimmed: &str) {
        if self.aggregation.is_empty() {
            self.aggregation = trimmed.to_string();
        } else {
            self.aggregation.push(' ');
            self.aggregation.push_str(trimmed);
        }
    }

    fn on_user_speech_start(&mut self) {
        self.aggregating = true;
        self.seen_start = true;
        self.seen_end = false;
        self.seen_interim = false;
        // `aggregation` deliberately not cleared: some upstream VADs emit
        // repeated starts mid-utterance.
    }

    fn on_user_speech_stop(&mut self, out: &mut Outputs) {
        if self.seen_interim || self.aggregation.trim().is_empty() {
            self.seen_end = true;
        } else {
            self.emit_context(out);
            self.reset_turn();
        }
    }

    fn on_transcription(&mut self, text: &str, out: &mut Outputs) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.aggregating && self.seen_end {
            self.append_transcript(trimmed);
            self.emit_context(out);
            self.reset_turn();
        } else {
            self.append_transcript(trimmed);
            self.seen_interim = false;
        }
    }

    fn on_tool_call_result(&mut self, result: ToolCallResult, out: &mut Outputs) {
        let tool_call_id = result
            .request
            .tool_calls
            .first()
            .map(|tc| tc.id.clone())
            .unwrap_or_default();
        let content = match &result.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.context
            .messages
            .push(Message::tool_result(tool_call_id, content));
        if result.properties.run_llm {
            out.emit(Frame::llm_context(self.context_payload()));
        }
        if let Some(cb) = &result.properties.on_update {
            (cb.0)(&result.result);
        }
    }

    fn on_messages_append(&mut self, append: MessagesAppend, out: &mut Outputs) {
        self.context.messages.extend(append.messages.clone());
        if append.properties.run_llm.unwrap_or(false) {
            out.emit(Frame::llm_context(self.context_payload()));
        }
        if append.properties.tool_call.unwrap_or(false) {
            if let Some(tool_call) = append
                .messages
                .iter()
                .rev()
                .find_map(|m| m.tool_calls.first().cloned())
            {
                if let Some(tx) = &self.tool_write_tx {
                    let _ = tx.try_send(tool_call);
                }
            }
        }
    }

    fn on_tools_replace(&mut self, replace: ToolsReplace, out: &mut Outputs) {
        self.context.tools = replace.tools.clone();
        if let Ok(mut shared) = self.tools_shared.lock() {
            *shared = replace.tools.clone();
        }
        self.context.messages.extend(replace.messages.clone());
        if replace.properties.run_llm.unwrap_or(false) {
            out.emit(Frame::llm_context(self.context_payload()));
        }
    }

    fn on_config_change(&mut self, patch: &crate::frame::types::ConfigPatch) {
        let Some(value) = patch.get("llm/context") else {
            return;
        };
        let Some(messages_value) = value.get("messages") else {
            return;
        };
        if let Ok(messages) = serde_json::from_value::<Vec<Message>>(messages_value.clone()) {
            self.context.messages = messages;
        }
    }
}

#[async_trait]
impl Processor for UserTurnAggregator {
    fn describe(&self) -> Descriptor {
        Descriptor::new()
            .with_in("in", "transcription, llm-context-messages-append, speak-frame, ...")
            .with_in("sys-in", "user-speech-start/stop, system-config-change")
            .with_out("out", "llm-context")
            .with_out("sys-out", "unused, carried for symmetry")
            .with_workload(Workload::Compute)
    }

    async fn init(&mut self, _params: Value) -> Result<()> {
        let (write_tx, write_rx) = mpsc::channel(32);
        let (read_tx, read_rx) = mpsc::channel(32);
        self.tool_write_tx = Some(write_tx);
        self.tool_read_rx = Some(read_rx);
        tokio::spawn(run_dispatcher_worker(
            self.tools_shared.clone(),
            write_rx,
            read_tx,
        ));
        Ok(())
    }

    async fn transition(&mut self, phase: Phase) -> Result<()> {
        if phase == Phase::Stop {
            self.tool_write_tx = None;
        }
        Ok(())
    }

    fn transform(&mut self, port: &str, frame: Frame) -> Outputs {
        let mut out = Outputs::new();
        if port == "sys-in" {
            match &frame.payload {
                FramePayload::UserSpeechStart(_) => self.on_user_speech_start(),
                FramePayload::UserSpeechStop(_) => self.on_user_speech_stop(&mut out),
                FramePayload::SystemConfigChange(patch) => self.on_config_change(patch),
                _ => {}
            }
            return out;
        }

        match frame.payload {
            FramePayload::Transcription(text) => self.on_transcription(&text, &mut out),
            FramePayload::TranscriptionInterim(_) => self.seen_interim = true,
            FramePayload::LlmToolCallResult(result) => self.on_tool_call_result(result, &mut out),
            FramePayload::LlmContextMessagesAppend(append) => {
                self.on_messages_append(append, &mut out)
            }
            FramePayload::LlmToolsReplace(replace) => self.on_tools_replace(replace, &mut out),
            FramePayload::SpeakFrame(text) => {
                self.context.messages.push(Message::assistant(text));
            }
            _ => {}
        }
        out
    }

    fn extra_in_ports(&mut self) -> Vec<(String, mpsc::Receiver<Frame>)> {
        match self.tool_read_rx.take() {
            Some(rx) => vec![("tool-read".to_string(), rx)],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initial_context() -> LLMContext {
        LLMContext::new(vec![Message::assistant("You are a helpful assistant")])
    }

    fn emitted_context(out: Outputs) -> ContextPayload {
        let items = out.into_vec();
        assert_eq!(items.len(), 1);
        match &items[0].1 {
            crate::processor::Emission::Frame(f) => match &f.payload {
                FramePayload::LlmContext(ctx) => ctx.clone(),
                other => unreachable!("expected llm-context, got {:?}", other),
            },
            _ => unreachable!("expected a frame emission"),
        }
    }

    #[test]
    fn user_utterance_aggregation_s_t_e() {
        let mut agg = UserTurnAggregator::new(initial_context());
        assert!(agg
            .transform("sys-in", Frame::user_speech_start(true))
            .into_vec()
            .is_empty());
        assert!(agg
            .transform("in", Frame::transcription("Hello there".into()))
            .into_vec()
            .is_empty());
        let out = agg.transform("sys-in", Frame::user_speech_stop(true));
        let ctx = emitted_context(out);
        assert_eq!(
            ctx.messages,
            vec![
                Message::assistant("You are a helpful assistant"),
                Message::user("Hello there"),
            ]
        );
    }

    #[test]
    fn interim_before_end_s_i_e_t() {
        let mut agg = UserTurnAggregator::new(initial_context());
        agg.transform("sys-in", Frame::user_speech_start(true));
        agg.transform("in", Frame::transcription_interim("hi".into()));
        let stop_out = agg.transform("sys-in", Frame::user_speech_stop(true));
        assert!(stop_out.into_vec().is_empty(), "stop must wait for the final transcript");
        let out = agg.transform("in", Frame::transcription("Hello there".into()));
        let ctx = emitted_context(out);
        assert_eq!(ctx.messages.last().unwrap().content, "Hello there");
        assert!(!agg.aggregating, "state must reset after emission");
    }

    #[test]
    fn s_e_alone_with_empty_aggregation_waits_for_transcript() {
        let mut agg = UserTurnAggregator::new(initial_context());
        agg.transform("sys-in", Frame::user_speech_start(true));
        let out = agg.transform("sys-in", Frame::user_speech_stop(true));
        assert!(out.into_vec().is_empty());
        assert!(agg.seen_end);
    }

    #[test]
    fn speak_frame_records_assistant_content_without_emitting() {
        let mut agg = UserTurnAggregator::new(initial_context());
        let out = agg.transform("in", Frame::speak_frame("Hi there!".into()));
        assert!(out.into_vec().is_empty());
        assert_eq!(agg.context.messages.last().unwrap().content, "Hi there!");
    }
}
