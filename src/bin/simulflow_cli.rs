//! Stdin-line / text-output demo transport (spec §6 "CLI surface").
//!
//! Not part of the core: this binary is a collaborator exercising the
//! documented contract end to end against an in-process graph of the real
//! aggregator, assembler and sentence splitter, with a toy echo "LLM" in
//! place of a vendor client (out of scope per spec §1).
//!
//! stdin text lines become `{user-speech-start, transcription(line),
//! user-speech-stop}`; text output renders `llm-text-chunk`, `speak-frame`,
//! and `llm-full-response-start/end`, gated by an "is LLM responding" flag
//! so typed input and streamed output never interleave on the terminal.

use std::io::{self, BufRead, Write};

use simulflow::aggregator::UserTurnAggregator;
use simulflow::assembler::AssistantResponseAssembler;
use simulflow::context::{LLMContext, Message};
use simulflow::frame::FramePayload;
use simulflow::processor::{Outputs, Processor};
use simulflow::sentence::SentenceSplitter;

/// Runs the assembled assistant message through a toy echo completion,
/// emitting it as the streamed-chunk shape real vendor clients would
/// produce, so the assembler/splitter pipeline is exercised faithfully.
fn fake_llm_reply(user_text: &str) -> String {
    format!("You said: {user_text}")
}

fn render(out: Outputs, responding: &mut bool) {
    for (_, emission) in out.into_vec() {
        let simulflow::processor::Emission::Frame(frame) = emission else {
            continue;
        };
        match frame.payload {
            FramePayload::LlmFullResponseStart => *responding = true,
            FramePayload::LlmFullResponseEnd => *responding = false,
            FramePayload::SpeakFrame(text) => {
                println!("bot> {text}");
            }
            FramePayload::LlmTextChunk(_) => {
                // Streamed text is rendered once assembled into sentences;
                // suppress raw chunks here to keep terminal output tidy.
            }
            _ => {}
        }
    }
    let _ = io::stdout().flush();
}

#[tokio::main]
async fn main() {
    simulflow::init_tracing();

    let context = LLMContext {
        messages: vec![Message::system("You are a helpful assistant")],
        tools: Vec::new(),
        tool_choice: None,
    };

    let mut aggregator = UserTurnAggregator::new(context);
    let mut assembler = AssistantResponseAssembler::new();
    let mut splitter = SentenceSplitter::new();
    let mut responding = false;

    println!("simulflow text demo. Type a line and press enter; Ctrl-D to quit.");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        aggregator.transform("sys-in", simulflow::Frame::user_speech_start(true));
        aggregator.transform("in", simulflow::Frame::transcription(line.clone()));
        let turn = aggregator.transform("sys-in", simulflow::Frame::user_speech_stop(true));
        if turn.is_empty() {
            continue;
        }

        render(
            assembler.transform("in", simulflow::Frame::llm_full_response_start()),
            &mut responding,
        );
        for word in fake_llm_reply(&line).split_inclusive(' ') {
            let chunk = word.to_string();
            assembler.transform("in", simulflow::Frame::llm_text_chunk(chunk.clone()));
            render(splitter.transform("in", simulflow::Frame::llm_text_chunk(chunk)), &mut responding);
        }
        let end = assembler.transform("in", simulflow::Frame::llm_full_response_end());
        for (_, emission) in end.into_vec() {
            if let simulflow::processor::Emission::Frame(frame) = emission {
                if matches!(frame.payload, FramePayload::LlmContextMessagesAppend(_)) {
                    aggregator.transform("in", frame);
                }
            }
        }
        responding = false;
    }
}
