//! Pure-data command values a `transform` can return instead of (or besides)
//! frames, executed by an init-owned worker so transforms stay synchronous
//! and side-effect-free (spec §4.12).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::frame::Frame;

/// An HTTP request the core expects the executor to open as a streaming
/// Server-Sent-Events connection, decoding chunks back onto the caller's
/// read port (spec §4.12, §6 "LLM wire contract").
#[derive(Debug, Clone)]
pub struct SseRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub timeout_ms: Option<u64>,
    pub buffer_size: Option<usize>,
}

/// A directive for the pacer's audio-writer worker: write `data` no earlier
/// than `delay_until_ms`, then release it to the underlying line (spec
/// §4.9). Processor-private, but modeled as a command (rather than folded
/// into a frame variant) because it is exactly what §4.12 describes: pure
/// data routed to an init-owned executor so `transform` stays synchronous.
#[derive(Debug, Clone)]
pub struct WriteAudio {
    pub data: Vec<u8>,
    pub delay_until_ms: u64,
    pub sample_rate: u32,
}

/// The `sse-request` kind is the only one the core itself must support
/// (spec §4.12); `WriteAudio` is the pacer's own private kind, carried
/// through the same pure-data command channel.
#[derive(Debug, Clone)]
pub enum CommandKind {
    SseRequest(SseRequest),
    WriteAudio(WriteAudio),
}

/// A pure-data description of a side effect (spec §4.12): `{kind, data, id?}`.
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandKind,
    pub id: Option<String>,
}

impl Command {
    pub fn sse_request(request: SseRequest) -> Self {
        Self {
            kind: CommandKind::SseRequest(request),
            id: None,
        }
    }

    pub fn write_audio(write: WriteAudio) -> Self {
        Self {
            kind: CommandKind::WriteAudio(write),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Performs the side effect a [`Command`] describes, streaming any result
/// back as frames on `reply`. Errors never propagate as exceptions; per
/// spec §7 a timeout or transport failure is delivered as a frame on the
/// reply channel instead.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: Command, reply: mpsc::Sender<Frame>);
}
