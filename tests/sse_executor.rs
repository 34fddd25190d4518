//! Integration test: `SseCommandExecutor` against a real HTTP connection
//! (spec §4.12, §6 "LLM wire contract").

use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use simulflow::command::SseCommandExecutor;
use simulflow::frame::FramePayload;
use simulflow::processor::command::{Command, CommandExecutor, SseRequest};

#[tokio::test]
async fn streams_an_openai_like_completion_and_emits_the_mapped_frames() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let executor = SseCommandExecutor::default();
    let (reply_tx, mut reply_rx) = mpsc::channel(16);
    let command = Command::sse_request(SseRequest {
        url: format!("{}/v1/chat/completions", server.uri()),
        method: "POST".to_string(),
        headers: Default::default(),
        body: Some(serde_json::json!({"stream": true})),
        timeout_ms: None,
        buffer_size: None,
    });

    executor.execute(command, reply_tx).await;

    let mut chunks = Vec::new();
    let mut saw_end = false;
    while let Some(frame) = reply_rx.recv().await {
        match frame.payload {
            FramePayload::LlmTextChunk(text) => chunks.push(text),
            FramePayload::LlmFullResponseEnd => saw_end = true,
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    assert_eq!(chunks, vec!["Hello".to_string(), " world".to_string()]);
    assert!(saw_end, "the [DONE] sentinel must map to llm-full-response-end");
}

#[tokio::test]
async fn non_2xx_status_surfaces_as_a_system_error_frame() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let executor = SseCommandExecutor::default();
    let (reply_tx, mut reply_rx) = mpsc::channel(16);
    let command = Command::sse_request(SseRequest {
        url: format!("{}/v1/chat/completions", server.uri()),
        method: "POST".to_string(),
        headers: Default::default(),
        body: None,
        timeout_ms: None,
        buffer_size: None,
    });

    executor.execute(command, reply_tx).await;

    let frame = reply_rx.recv().await.expect("one error frame");
    assert!(matches!(frame.payload, FramePayload::SystemError(_)));
}
