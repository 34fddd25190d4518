//! Init-owned command executors: perform the side effects a `transform`
//! described as pure data (spec §4.12).

pub mod sse;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::frame::{Frame, FramePayload};
use crate::processor::command::{Command, CommandExecutor, CommandKind, SseRequest};

use self::sse::SseLineParser;

/// Executes `sse-request` commands by opening a streaming HTTP connection
/// and decoding the OpenAI-like chunk shape (spec §6 "LLM wire contract")
/// into frames: a chunk's `delta.content` maps to `llm-text-chunk`, its
/// `tool_calls[0]` to `llm-tool-call-chunk`, and the `[DONE]` sentinel to
/// `llm-full-response-end`. Non-LLM SSE payloads still decode as raw text
/// via `llm-text-chunk` so the executor has one fallback shape rather than
/// silently dropping bytes it doesn't recognize.
pub struct SseCommandExecutor {
    client: reqwest::Client,
}

impl Default for SseCommandExecutor {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl SseCommandExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn run(&self, request: SseRequest, reply: mpsc::Sender<Frame>) {
        let method = match request.method.to_ascii_uppercase().as_str() {
            "GET" => reqwest::Method::GET,
            _ => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout_ms) = request.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                let _ = reply
                    .send(Frame::system_error(format!("sse-request failed: {err}")))
                    .await;
                return;
            }
        };

        if let Err(err) = response.error_for_status_ref() {
            let _ = reply
                .send(Frame::system_error(format!("sse-request status: {err}")))
                .await;
            return;
        }

        let mut byte_stream = response.bytes_stream();
        let mut parser = SseLineParser::new();
        while let Some(chunk) = byte_stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    let _ = reply
                        .send(Frame::system_error(format!("sse-request stream error: {err}")))
                        .await;
                    return;
                }
            };
            for event in parser.push(&bytes) {
                if event.is_done() {
                    let _ = reply.send(Frame::llm_full_response_end()).await;
                    continue;
                }
                for frame in decode_chunk(&event.data) {
                    if reply.send(frame).await.is_err() {
                        return;
                    }
                }
            }
        }
        if let Some(event) = parser.flush() {
            if !event.is_done() {
                for frame in decode_chunk(&event.data) {
                    let _ = reply.send(frame).await;
                }
            }
        }
    }
}

/// Maps one `data:` payload, assumed to be an OpenAI-like
/// `{choices:[{delta:{content?, tool_calls?}}]}` chunk (spec §6), to the
/// frame(s) it represents. Anything that doesn't parse that way is carried
/// through as a raw text chunk rather than dropped silently.
fn decode_chunk(data: &str) -> Vec<Frame> {
    let Ok(value) = serde_json::from_str::<Value>(data) else {
        return vec![Frame::llm_text_chunk(data.to_string())];
    };

    let Some(delta) = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
    else {
        return Vec::new();
    };

    let mut frames = Vec::new();
    if let Some(content) = delta.get("content").and_then(Value::as_str) {
        if !content.is_empty() {
            frames.push(Frame::llm_text_chunk(content.to_string()));
        }
    }
    if let Some(tool_call) = delta.get("tool_calls").and_then(|t| t.get(0)) {
        frames.push(Frame::llm_tool_call_chunk(crate::frame::types::ToolCallChunk {
            index: tool_call.get("index").and_then(Value::as_u64).unwrap_or(0) as u32,
            id: tool_call.get("id").and_then(Value::as_str).map(str::to_string),
            kind: tool_call.get("type").and_then(Value::as_str).map(str::to_string),
            function_name: tool_call
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string),
            function_arguments: tool_call
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }));
    }
    frames
}

#[async_trait]
impl CommandExecutor for SseCommandExecutor {
    async fn execute(&self, command: Command, reply: mpsc::Sender<Frame>) {
        match command.kind {
            CommandKind::SseRequest(request) => self.run(request, reply).await,
            CommandKind::WriteAudio(_) => {
                // Not this executor's concern; the pacer's audio-writer
                // worker consumes `WriteAudio` directly (spec §4.9).
            }
        }
    }
}
