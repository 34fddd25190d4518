//! Input transport: mute gating, VAD application, and `bot-interrupt`
//! surfacing on already-resampled 16 kHz mono PCM audio (spec §4.4).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::frame::{Frame, FramePayload};
use crate::processor::{Descriptor, Outputs, Phase, Processor, Workload};
use crate::vad::{SileroWrapper, VadAnalyzer, VadStateMachine};

pub struct InputTransport {
    vad: VadStateMachine,
    silero: SileroWrapper,
    muted: bool,
    interruption_supported: bool,
}

impl InputTransport {
    pub fn new(
        analyzer: Box<dyn VadAnalyzer>,
        min_confidence: f32,
        start_frames: u32,
        stop_frames: u32,
        interruption_supported: bool,
    ) -> Self {
        Self {
            vad: VadStateMachine::new(start_frames, stop_frames),
            silero: SileroWrapper::new(analyzer, min_confidence),
            muted: false,
            interruption_supported,
        }
    }
}

#[async_trait]
impl Processor for InputTransport {
    fn describe(&self) -> Descriptor {
        Descriptor::new()
            .with_in("in", "raw 16kHz mono PCM audio")
            .with_in("sys-in", "mute-input-start/stop, bot-interrupt")
            .with_out("out", "forwarded audio")
            .with_out("sys-out", "VAD events, control-interrupt-start")
            .with_param(
                "interruption-supported",
                "whether bot-interrupt should raise control-interrupt-start",
            )
            .with_workload(Workload::Compute)
    }

    async fn init(&mut self, params: Value) -> Result<()> {
        if let Some(supported) = params
            .get("interruption-supported")
            .and_then(Value::as_bool)
        {
            self.interruption_supported = supported;
        }
        Ok(())
    }

    async fn transition(&mut self, _phase: Phase) -> Result<()> {
        Ok(())
    }

    fn transform(&mut self, port: &str, frame: Frame) -> Outputs {
        let mut out = Outputs::new();
        match port {
            "sys-in" => match &frame.payload {
                FramePayload::MuteInputStart(_) => self.muted = true,
                FramePayload::MuteInputStop(_) => self.muted = false,
                FramePayload::BotInterrupt(_) if self.interruption_supported => {
                    out.emit(Frame::control_interrupt_start(true));
                }
                _ => {}
            },
            "in" => match &frame.payload {
                FramePayload::AudioInputRaw(bytes) if !self.muted => {
                    let decisions = self.silero.push(bytes);
                    out.emit_on("out", frame.clone());
                    for speaking in decisions {
                        let events = self.vad.observe(speaking);
                        if events.entered_speaking {
                            out.emit(Frame::user_speech_start(true));
                            out.emit(Frame::vad_user_speech_start(true));
                            if self.interruption_supported {
                                out.emit(Frame::control_interrupt_start(true));
                            }
                        }
                        if events.entered_quiet {
                            out.emit(Frame::user_speech_stop(true));
                            out.emit(Frame::vad_user_speech_stop(true));
                        }
                    }
                }
                FramePayload::AudioInputRaw(_) => {
                    // Muted: drop entirely, no VAD either (spec §4.4).
                }
                _ => {}
            },
            _ => {}
        }
        out
    }
}
