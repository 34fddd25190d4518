//! The frame model: a typed, timestamped message envelope flowing through
//! the processor graph (spec §3).

mod timestamp;
pub mod types;

pub use timestamp::Timestamp;
pub use types::{
    AppendProperties, AudioChunk, ConfigPatch, ContextPayload, MessagesAppend, OnUpdateCallback,
    ToolCallChunk, ToolCallRequest, ToolCallResult, ToolResultProperties, ToolsReplace,
};

use crate::error::{Result, SimulflowError};

/// The closed taxonomy of frame payloads (spec §3's "Frame taxonomy" table).
///
/// A code-generator-from-a-type-table is how the original expresses this;
/// in Rust the type table and the generated shape collapse into one enum,
/// with `macro_rules!` below standing in for the generated constructors.
#[derive(Debug, Clone)]
pub enum FramePayload {
    // -- System --
    SystemStart,
    SystemStop,
    SystemConfigChange(ConfigPatch),

    // -- Audio --
    AudioInputRaw(Vec<u8>),
    AudioOutputRaw(AudioChunk),
    AudioTtsRaw(Vec<u8>),

    // -- Transcription --
    Transcription(String),
    TranscriptionInterim(String),

    // -- LLM context --
    LlmContext(ContextPayload),
    LlmContextMessagesAppend(MessagesAppend),
    LlmToolsReplace(ToolsReplace),

    // -- LLM output --
    LlmTextChunk(String),
    LlmToolCallChunk(ToolCallChunk),
    LlmToolCallRequest(ToolCallRequest),
    LlmToolCallResult(ToolCallResult),
    LlmFullResponseStart,
    LlmFullResponseEnd,
    LlmTextSentence(String),

    // -- User --
    UserSpeechStart(bool),
    UserSpeechStop(bool),
    VadUserSpeechStart(bool),
    VadUserSpeechStop(bool),

    // -- Bot --
    BotSpeechStart(bool),
    BotSpeechStop(bool),
    BotInterrupt(bool),

    // -- Control --
    ControlInterruptStart(bool),
    ControlInterruptStop(bool),

    // -- Mute (system-plane, spec §3 SYSTEM_FRAMES) --
    MuteInputStart(bool),
    MuteInputStop(bool),

    // -- Text --
    SpeakFrame(String),
    TextInput(String),

    // -- Runtime-synthesized (spec §7: unhandled transform panics) --
    SystemError(String),
}

impl FramePayload {
    /// A short, stable name for logging and the `scenario-context-update`
    /// dispatch the aggregator performs by frame kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SystemStart => "system-start",
            Self::SystemStop => "system-stop",
            Self::SystemConfigChange(_) => "system-config-change",
            Self::AudioInputRaw(_) => "audio-input-raw",
            Self::AudioOutputRaw(_) => "audio-output-raw",
            Self::AudioTtsRaw(_) => "audio-tts-raw",
            Self::Transcription(_) => "transcription",
            Self::TranscriptionInterim(_) => "transcription-interim",
            Self::LlmContext(_) => "llm-context",
            Self::LlmContextMessagesAppend(_) => "llm-context-messages-append",
            Self::LlmToolsReplace(_) => "llm-tools-replace",
            Self::LlmTextChunk(_) => "llm-text-chunk",
            Self::LlmToolCallChunk(_) => "llm-tool-call-chunk",
            Self::LlmToolCallRequest(_) => "llm-tool-call-request",
            Self::LlmToolCallResult(_) => "llm-tool-call-result",
            Self::LlmFullResponseStart => "llm-full-response-start",
            Self::LlmFullResponseEnd => "llm-full-response-end",
            Self::LlmTextSentence(_) => "llm-text-sentence",
            Self::UserSpeechStart(_) => "user-speech-start",
            Self::UserSpeechStop(_) => "user-speech-stop",
            Self::VadUserSpeechStart(_) => "vad-user-speech-start",
            Self::VadUserSpeechStop(_) => "vad-user-speech-stop",
            Self::BotSpeechStart(_) => "bot-speech-start",
            Self::BotSpeechStop(_) => "bot-speech-stop",
            Self::BotInterrupt(_) => "bot-interrupt",
            Self::ControlInterruptStart(_) => "control-interrupt-start",
            Self::ControlInterruptStop(_) => "control-interrupt-stop",
            Self::MuteInputStart(_) => "mute-input-start",
            Self::MuteInputStop(_) => "mute-input-stop",
            Self::SpeakFrame(_) => "speak-frame",
            Self::TextInput(_) => "text-input",
            Self::SystemError(_) => "system-error",
        }
    }

    /// `SYSTEM_FRAMES` membership (spec §3): these traverse the system
    /// plane; everything else is a data-plane frame. `system-error` is a
    /// runtime-synthesized addition (spec §7) not in the literal taxonomy
    /// list; it is treated as system-plane since it is control information
    /// about the graph itself, not payload data (see DESIGN.md).
    pub fn is_system_frame(&self) -> bool {
        matches!(
            self,
            Self::SystemStart
                | Self::SystemStop
                | Self::SystemConfigChange(_)
                | Self::UserSpeechStart(_)
                | Self::UserSpeechStop(_)
                | Self::VadUserSpeechStart(_)
                | Self::VadUserSpeechStop(_)
                | Self::BotSpeechStart(_)
                | Self::BotSpeechStop(_)
                | Self::BotInterrupt(_)
                | Self::ControlInterruptStart(_)
                | Self::ControlInterruptStop(_)
                | Self::MuteInputStart(_)
                | Self::MuteInputStop(_)
                | Self::SystemError(_)
        )
    }
}

/// An immutable, timestamped envelope carrying one [`FramePayload`]
/// (spec §3 "Frame").
#[derive(Debug, Clone)]
pub struct Frame {
    pub payload: FramePayload,
    pub ts: Timestamp,
}

impl Frame {
    pub fn new(payload: FramePayload) -> Self {
        Self {
            payload,
            ts: Timestamp::now(),
        }
    }

    pub fn with_ts(payload: FramePayload, ts: Timestamp) -> Self {
        Self { payload, ts }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// `SYSTEM_FRAMES` membership check used by the output-routing helper
    /// (spec §8 invariant 2).
    pub fn is_system_frame(&self) -> bool {
        self.payload.is_system_frame()
    }

    /// Well-formedness check (spec §3 `is-frame?`). Optional per-type
    /// shape validation only runs when `schema_checking` is enabled
    /// (spec §6 `simulflow.frame.schema-checking`); violations surface as
    /// [`SimulflowError::InvalidFrame`] at construction rather than deep in
    /// a transform.
    pub fn validate(&self, schema_checking: bool) -> Result<()> {
        if !schema_checking {
            return Ok(());
        }
        match &self.payload {
            FramePayload::Transcription(s) | FramePayload::TranscriptionInterim(s) => {
                if s.is_empty() {
                    return Err(SimulflowError::InvalidFrame(format!(
                        "{} payload must not be empty",
                        self.kind()
                    )));
                }
            }
            FramePayload::AudioOutputRaw(chunk) => {
                if chunk.sample_rate == 0 {
                    return Err(SimulflowError::InvalidFrame(
                        "audio-output-raw sample_rate must be nonzero".into(),
                    ));
                }
            }
            FramePayload::LlmToolCallChunk(tc) => {
                if tc.function_name.is_none()
                    && tc.function_arguments.is_none()
                    && tc.id.is_none()
                {
                    return Err(SimulflowError::InvalidFrame(
                        "llm-tool-call-chunk must carry at least one field".into(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Generates `Frame::<name>(..)` constructors from a single table, standing
/// in for the source's macro-generated `NewX`/`IsX` per frame type (spec §9).
macro_rules! frame_ctor {
    ($name:ident, $variant:ident) => {
        pub fn $name() -> Frame {
            Frame::new(FramePayload::$variant)
        }
    };
    ($name:ident, $variant:ident, $arg_ty:ty) => {
        pub fn $name(value: $arg_ty) -> Frame {
            Frame::new(FramePayload::$variant(value))
        }
    };
}

impl Frame {
    frame_ctor!(system_start, SystemStart);
    frame_ctor!(system_stop, SystemStop);
    frame_ctor!(system_config_change, SystemConfigChange, ConfigPatch);
    frame_ctor!(audio_input_raw, AudioInputRaw, Vec<u8>);
    frame_ctor!(audio_output_raw, AudioOutputRaw, AudioChunk);
    frame_ctor!(audio_tts_raw, AudioTtsRaw, Vec<u8>);
    frame_ctor!(transcription, Transcription, String);
    frame_ctor!(transcription_interim, TranscriptionInterim, String);
    frame_ctor!(llm_context, LlmContext, ContextPayload);
    frame_ctor!(
        llm_context_messages_append,
        LlmContextMessagesAppend,
        MessagesAppend
    );
    frame_ctor!(llm_tools_replace, LlmToolsReplace, ToolsReplace);
    frame_ctor!(llm_text_chunk, LlmTextChunk, String);
    frame_ctor!(llm_tool_call_chunk, LlmToolCallChunk, ToolCallChunk);
    frame_ctor!(llm_tool_call_request, LlmToolCallRequest, ToolCallRequest);
    frame_ctor!(llm_tool_call_result, LlmToolCallResult, ToolCallResult);
    frame_ctor!(llm_full_response_start, LlmFullResponseStart);
    frame_ctor!(llm_full_response_end, LlmFullResponseEnd);
    frame_ctor!(llm_text_sentence, LlmTextSentence, String);
    frame_ctor!(user_speech_start, UserSpeechStart, bool);
    frame_ctor!(user_speech_stop, UserSpeechStop, bool);
    frame_ctor!(vad_user_speech_start, VadUserSpeechStart, bool);
    frame_ctor!(vad_user_speech_stop, VadUserSpeechStop, bool);
    frame_ctor!(bot_speech_start, BotSpeechStart, bool);
    frame_ctor!(bot_speech_stop, BotSpeechStop, bool);
    frame_ctor!(bot_interrupt, BotInterrupt, bool);
    frame_ctor!(control_interrupt_start, ControlInterruptStart, bool);
    frame_ctor!(control_interrupt_stop, ControlInterruptStop, bool);
    frame_ctor!(mute_input_start, MuteInputStart, bool);
    frame_ctor!(mute_input_stop, MuteInputStop, bool);
    frame_ctor!(speak_frame, SpeakFrame, String);
    frame_ctor!(text_input, TextInput, String);
    frame_ctor!(system_error, SystemError, String);
}

/// Which out-port a frame should be emitted on: the system plane iff its
/// type is in `SYSTEM_FRAMES`, else the data plane (spec §8 invariant 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Data,
    System,
}

pub fn route(frame: &Frame) -> Plane {
    if frame.is_system_frame() {
        Plane::System
    } else {
        Plane::Data
    }
}
