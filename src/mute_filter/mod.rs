//! Mute filter: applies configurable strategies that raise `mute-input-*`
//! system frames around bot speech and tool execution (spec §4.11).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::frame::{Frame, FramePayload};
use crate::processor::{Descriptor, Outputs, Phase, Processor, Workload};

/// Which triggers should cause the input to mute (spec §4.11).
#[derive(Debug, Clone, Copy, Default)]
pub struct MuteStrategies {
    pub first_speech: bool,
    pub bot_speech: bool,
    pub tool_call: bool,
}

pub struct MuteFilter {
    muted: bool,
    first_speech_started: bool,
    first_speech_ended: bool,
    strategies: MuteStrategies,
}

impl MuteFilter {
    pub fn new(strategies: MuteStrategies) -> Self {
        Self {
            muted: false,
            first_speech_started: false,
            first_speech_ended: false,
            strategies,
        }
    }

    fn start_active(&self) -> bool {
        (self.strategies.first_speech && !self.first_speech_started) || self.strategies.bot_speech
    }

    fn stop_active(&self) -> bool {
        (self.strategies.first_speech && !self.first_speech_ended) || self.strategies.bot_speech
    }
}

#[async_trait]
impl Processor for MuteFilter {
    fn describe(&self) -> Descriptor {
        Descriptor::new()
            .with_in("in", "bot-speech-start/stop, llm-tool-call-request/result")
            .with_out("sys-out", "mute-input-start/stop")
            .with_param("first-speech", "mute only until the bot's first utterance completes")
            .with_param("bot-speech", "mute for the duration of every bot utterance")
            .with_param("tool-call", "mute while a tool call is in flight")
            .with_workload(Workload::Compute)
    }

    async fn init(&mut self, params: Value) -> Result<()> {
        if let Some(v) = params.get("first-speech").and_then(Value::as_bool) {
            self.strategies.first_speech = v;
        }
        if let Some(v) = params.get("bot-speech").and_then(Value::as_bool) {
            self.strategies.bot_speech = v;
        }
        if let Some(v) = params.get("tool-call").and_then(Value::as_bool) {
            self.strategies.tool_call = v;
        }
        Ok(())
    }

    async fn transition(&mut self, _phase: Phase) -> Result<()> {
        Ok(())
    }

    fn transform(&mut self, _port: &str, frame: Frame) -> Outputs {
        let mut out = Outputs::new();
        match &frame.payload {
            FramePayload::BotSpeechStart(_) => {
                if self.start_active() && !self.muted {
                    self.muted = true;
                    out.emit(Frame::mute_input_start(true));
                }
                if self.strategies.first_speech {
                    self.first_speech_started = true;
                }
            }
            FramePayload::BotSpeechStop(_) => {
                if self.stop_active() && self.muted {
                    self.muted = false;
                    out.emit(Frame::mute_input_stop(true));
                }
                if self.strategies.first_speech {
                    self.first_speech_ended = true;
                }
            }
            FramePayload::LlmToolCallRequest(_) => {
                if self.strategies.tool_call && !self.muted {
                    self.muted = true;
                    out.emit(Frame::mute_input_start(true));
                }
            }
            FramePayload::LlmToolCallResult(_) => {
                if self.strategies.tool_call && self.muted {
                    self.muted = false;
                    out.emit(Frame::mute_input_stop(true));
                }
            }
            _ => {}
        }
        out
    }
}
