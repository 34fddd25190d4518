//! Sentence splitter: accumulates streaming text until a sentence boundary,
//! then emits a `speak-frame` for the completed sentence (spec §4.7).

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::frame::{Frame, FramePayload};
use crate::processor::{Descriptor, Outputs, Phase, Processor, Workload};

/// Title/initialism abbreviations that must not be mistaken for a sentence
/// boundary (spec §4.7). Checked case-sensitively against the text
/// immediately preceding the matched punctuation.
const ABBREVIATIONS: &[&str] = &["Mr.", "Mrs.", "Ms.", "Dr.", "Prof."];

fn boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Half-width terminators need a following whitespace/end-of-string
        // to count as a boundary (so "3.14" and "U.S.A." don't match mid-
        // word); full-width terminators are unambiguous in CJK text, which
        // has no inter-sentence spaces, so they match unconditionally.
        // Post-filtering in `find_boundary`/`is_suppressed` still rules out
        // abbreviations, digit-dot, and a.m./p.m. for the half-width case.
        Regex::new(r#"(?:[.?!:;]['")]*(?:\s|$))|[。？！：；][’”）]*"#)
            .expect("static sentence-boundary regex must compile")
    })
}

/// Whether the punctuation mark ending at byte offset `end` (exclusive) in
/// `text` is part of a pattern that must *not* trigger a split (spec §4.7):
/// an uppercase-letter abbreviation (`U.S.A.`), a digit followed by `.`
/// (`1.`, `3.2.`), a title abbreviation (`Mr.`), or an a.m./p.m. marker.
fn is_suppressed(text: &str, mark_start: usize, mark_end: usize) -> bool {
    let mark = &text[mark_start..mark_end];
    if mark != "." {
        return false;
    }
    let before = &text[..mark_start];

    // Digit immediately before the dot: "1.", "3.2."
    if before.chars().next_back().is_some_and(|c| c.is_ascii_digit()) {
        return true;
    }

    // Title abbreviations: check the suffix of `before` + the dot.
    for abbr in ABBREVIATIONS {
        let stem = &abbr[..abbr.len() - 1]; // strip trailing '.'
        if before.ends_with(stem) {
            let prefix_ok = before.len() == stem.len()
                || !before[..before.len() - stem.len()]
                    .chars()
                    .next_back()
                    .is_some_and(|c| c.is_alphanumeric());
            if prefix_ok {
                return true;
            }
        }
    }

    // a.m./p.m.: the dot closes a single lowercase letter preceded by
    // another "<letter>." run, e.g. "a.m." or "p.m.".
    if before.ends_with('m') || before.ends_with('M') {
        let mut chars = before.chars().rev();
        let _m = chars.next();
        if chars.next() == Some('.') {
            if let Some(first) = chars.next() {
                if first.eq_ignore_ascii_case(&'a') || first.eq_ignore_ascii_case(&'p') {
                    return true;
                }
            }
        }
    }

    // Uppercase-letter abbreviation run: "U.S.A." — the dot closes a
    // single uppercase letter, and the character before the matching run
    // is also an uppercase-letter-dot pair (or start of a run of them).
    if let Some(letter) = before.chars().next_back() {
        if letter.is_ascii_uppercase() {
            let stem = &before[..before.len() - letter.len_utf8()];
            if stem.ends_with('.') {
                if let Some(prev) = stem[..stem.len() - 1].chars().next_back() {
                    if prev.is_ascii_uppercase() {
                        return true;
                    }
                }
                // Two-letter run ("U.S.") is itself enough to suppress the
                // first dot; the recursive case above handles the rest.
                return true;
            }
        }
    }

    false
}

/// Find the earliest non-suppressed sentence boundary in `text`, returning
/// the byte offset just past the terminator (and any trailing closer).
fn find_boundary(text: &str) -> Option<usize> {
    for m in boundary_regex().find_iter(text) {
        let mark_end = m.end() - m.as_str().chars().last().map_or(0, |c| {
            if c.is_whitespace() {
                c.len_utf8()
            } else {
                0
            }
        });
        // mark_start is the start of the terminator character itself.
        let terminator_len = m
            .as_str()
            .chars()
            .next()
            .map(|c| c.len_utf8())
            .unwrap_or(0);
        let mark_start = m.start();
        let mark_term_end = mark_start + terminator_len;
        if !is_suppressed(text, mark_start, mark_term_end) {
            return Some(mark_end);
        }
    }
    None
}

/// Accumulates streaming `llm-text-chunk`s and splits them into sentences
/// (spec §4.7). Drops its accumulator on interruption.
#[derive(Debug, Default)]
pub struct SentenceSplitter {
    buffer: String,
    interrupted: bool,
}

impl SentenceSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_text_chunk(&mut self, chunk: &str, out: &mut Outputs) {
        if self.interrupted {
            return;
        }
        self.buffer.push_str(chunk);
        while let Some(boundary) = find_boundary(&self.buffer) {
            let sentence = self.buffer[..boundary].trim().to_string();
            self.buffer.drain(..boundary);
            if !sentence.is_empty() {
                out.emit(Frame::speak_frame(sentence));
            }
        }
    }

    fn on_full_response_end(&mut self, out: &mut Outputs) {
        let remainder = self.buffer.trim().to_string();
        self.buffer.clear();
        if !remainder.is_empty() {
            out.emit(Frame::speak_frame(remainder));
        }
    }
}

#[async_trait]
impl Processor for SentenceSplitter {
    fn describe(&self) -> Descriptor {
        Descriptor::new()
            .with_in("in", "llm-text-chunk, llm-full-response-end")
            .with_in("sys-in", "control-interrupt-start/stop")
            .with_out("out", "speak-frame")
            .with_workload(Workload::Compute)
    }

    async fn init(&mut self, _params: Value) -> Result<()> {
        Ok(())
    }

    async fn transition(&mut self, _phase: Phase) -> Result<()> {
        Ok(())
    }

    fn transform(&mut self, port: &str, frame: Frame) -> Outputs {
        let mut out = Outputs::new();
        if port == "sys-in" {
            match &frame.payload {
                FramePayload::ControlInterruptStart(_) => {
                    self.buffer.clear();
                    self.interrupted = true;
                }
                FramePayload::ControlInterruptStop(_) => self.interrupted = false,
                _ => {}
            }
            return out;
        }
        match &frame.payload {
            FramePayload::LlmTextChunk(chunk) => self.on_text_chunk(chunk, &mut out),
            FramePayload::LlmFullResponseEnd => self.on_full_response_end(&mut out),
            _ => {}
        }
        out
    }
}
