//! Simulflow: a dataflow runtime for real-time, bidirectional voice agents.
//!
//! A caller's audio enters one end of a graph of [`processor`]s connected by
//! bounded, typed channels carrying [`frame`]s; it is transcribed, fed to an
//! LLM, and the model's streamed text is converted back to audio while the
//! system concurrently tracks voice activity, aggregates conversational
//! context, dispatches tool calls, and supports the caller interrupting the
//! bot mid-speech.
//!
//! # Architecture
//!
//! - [`frame`] — the typed, timestamped message envelope and its closed
//!   taxonomy, plus the system/data-plane routing rule.
//! - [`processor`] — the describe/init/transition/transform contract, the
//!   graph runtime, the system-frame router, and the pure-data command
//!   layer.
//! - [`vad`] — the four-state hysteresis voice-activity machine.
//! - [`transport`] — input transport: mute gating, VAD application,
//!   interrupt surfacing.
//! - [`aggregator`] — the user-turn aggregator.
//! - [`assembler`] — the assistant-response assembler.
//! - [`sentence`] — the sentence-boundary splitter feeding TTS.
//! - [`tools`] — the tool-call dispatcher.
//! - [`pacer`] — the real-time audio-out pacer and its matching splitter.
//! - [`activity_monitor`] — idle-timeout pings and end-of-call.
//! - [`mute_filter`] — mute strategies around bot speech and tool calls.
//! - [`codec`] — the frame serializer contract and the Twilio codec.
//! - [`context`] — `LLMContext`, `Message`, `ToolDefinition`.
//! - [`command`] — the `sse-request` executor (spec §4.12, §6).
//! - [`config`] — the serde configuration tree.

pub mod activity_monitor;
pub mod aggregator;
pub mod assembler;
pub mod codec;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod mute_filter;
pub mod pacer;
pub mod processor;
pub mod sentence;
pub mod tools;
pub mod transport;
pub mod vad;

pub use config::SimulflowConfig;
pub use error::{Result, SimulflowError};
pub use frame::{Frame, FramePayload};

/// Initializes a `tracing-subscriber` `EnvFilter` logger for binaries and
/// integration tests (spec SPEC_FULL §A "Logging"). Safe to call more than
/// once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_test_writer()
        .try_init();
}
