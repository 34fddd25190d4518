//! Byte-buffer accumulation around a pluggable speech-confidence analyzer
//! (spec §4.3 "silero-style wrapper"). The actual Silero ONNX invocation is
//! an external collaborator (spec §1 Non-goals); this module only owns the
//! buffering, windowing, and periodic state-reset policy around it.

use std::time::{Duration, Instant};

/// Per-window speech-confidence inference. Implementations hold whatever
/// model state they need; [`SileroWrapper`] resets that state periodically
/// via [`VadAnalyzer::reset`] (spec §9 "Reify-based protocol objects").
pub trait VadAnalyzer: Send {
    /// Run inference on exactly `frames_required()` bytes, returning a
    /// confidence in `[0.0, 1.0]`.
    fn infer(&mut self, window: &[u8]) -> f32;

    /// Bytes of PCM16 mono audio required per inference: 512 samples at
    /// 16 kHz, 256 at 8 kHz (spec §4.3), times 2 bytes/sample.
    fn frames_required(&self) -> usize;

    /// Clear internal recurrent state, called every 5s by the wrapper to
    /// bound memory (spec §4.3).
    fn reset(&mut self);
}

/// Accumulates raw audio bytes until a full analysis window is available,
/// runs one inference, and reports whether the window counts as speech
/// against `min_confidence`. Leftover bytes below a full window carry over
/// to the next call.
pub struct SileroWrapper {
    analyzer: Box<dyn VadAnalyzer>,
    buffer: Vec<u8>,
    min_confidence: f32,
    last_reset: Instant,
    reset_interval: Duration,
}

impl SileroWrapper {
    pub fn new(analyzer: Box<dyn VadAnalyzer>, min_confidence: f32) -> Self {
        Self {
            analyzer,
            buffer: Vec::new(),
            min_confidence,
            last_reset: Instant::now(),
            reset_interval: Duration::from_secs(5),
        }
    }

    /// Feed raw bytes in; returns one `speaking?` decision per full window
    /// consumed from the accumulated buffer (spec §4.3: "carries over the
    /// leftover bytes").
    pub fn push(&mut self, bytes: &[u8]) -> Vec<bool> {
        self.buffer.extend_from_slice(bytes);
        let window_len = self.analyzer.frames_required();
        if window_len == 0 {
            return Vec::new();
        }

        let mut decisions = Vec::new();
        let mut offset = 0;
        while self.buffer.len() - offset >= window_len {
            if self.last_reset.elapsed() >= self.reset_interval {
                self.analyzer.reset();
                self.last_reset = Instant::now();
            }
            let window = &self.buffer[offset..offset + window_len];
            let confidence = self.analyzer.infer(window);
            decisions.push(confidence >= self.min_confidence);
            offset += window_len;
        }
        self.buffer.drain(0..offset);
        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAnalyzer {
        confidence: f32,
        frames_required: usize,
        reset_count: u32,
    }

    impl VadAnalyzer for FixedAnalyzer {
        fn infer(&mut self, _window: &[u8]) -> f32 {
            self.confidence
        }

        fn frames_required(&self) -> usize {
            self.frames_required
        }

        fn reset(&mut self) {
            self.reset_count += 1;
        }
    }

    #[test]
    fn emits_one_decision_per_full_window_and_retains_remainder() {
        let analyzer = FixedAnalyzer {
            confidence: 0.9,
            frames_required: 4,
            reset_count: 0,
        };
        let mut wrapper = SileroWrapper::new(Box::new(analyzer), 0.5);

        let decisions = wrapper.push(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(decisions, vec![true]);
        assert_eq!(wrapper.buffer.len(), 2);

        let decisions = wrapper.push(&[6, 7]);
        assert_eq!(decisions, vec![true]);
        assert!(wrapper.buffer.is_empty());
    }

    #[test]
    fn confidence_below_threshold_is_not_speech() {
        let analyzer = FixedAnalyzer {
            confidence: 0.1,
            frames_required: 2,
            reset_count: 0,
        };
        let mut wrapper = SileroWrapper::new(Box::new(analyzer), 0.5);
        assert_eq!(wrapper.push(&[0, 1]), vec![false]);
    }
}
