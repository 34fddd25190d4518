//! Voice-activity detection: a four-state hysteresis machine over
//! per-window speech confidence (spec §4.3).

pub mod silero;

pub use silero::{SileroWrapper, VadAnalyzer};

/// The VAD's tagged state (spec §3 "VAD state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Quiet,
    Starting,
    Speaking,
    Stopping,
}

/// What happened on a single [`VadStateMachine::observe`] call: whether
/// speech just started or just ended, from the hysteresis machine's point
/// of view (spec §4.3's "emit on transition" note).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VadEvents {
    pub entered_speaking: bool,
    pub entered_quiet: bool,
}

/// Confidence → `quiet | starting | speaking | stopping` hysteresis machine
/// (spec §4.3). `start_frames`/`stop_frames` are consecutive-window counts,
/// not durations; see [`VadStateMachine::frames_for_duration`] to derive
/// them from a millisecond threshold.
#[derive(Debug, Clone)]
pub struct VadStateMachine {
    state: VadState,
    count: u32,
    start_frames: u32,
    stop_frames: u32,
}

impl VadStateMachine {
    pub fn new(start_frames: u32, stop_frames: u32) -> Self {
        Self {
            state: VadState::Quiet,
            count: 0,
            start_frames: start_frames.max(1),
            stop_frames: stop_frames.max(1),
        }
    }

    /// `start-frames = round(min-speech-ms / (1000 / frames-per-sec))`: the
    /// number of analysis windows that fit in `min_duration_ms`, given the
    /// analyzer runs `frames_per_sec` inferences per second of audio.
    pub fn frames_for_duration(min_duration_ms: u32, frames_per_sec: f64) -> u32 {
        ((min_duration_ms as f64 / 1000.0) * frames_per_sec).round() as u32
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    /// Feed one window's speech/silence decision through the hysteresis
    /// machine (spec §4.3 transition table).
    pub fn observe(&mut self, speaking: bool) -> VadEvents {
        let previous = self.state;
        self.state = match (self.state, speaking) {
            (VadState::Quiet, true) => {
                self.count = 1;
                VadState::Starting
            }
            (VadState::Quiet, false) => VadState::Quiet,
            (VadState::Starting, true) => {
                self.count += 1;
                if self.count >= self.start_frames {
                    self.count = 0;
                    VadState::Speaking
                } else {
                    VadState::Starting
                }
            }
            (VadState::Starting, false) => {
                self.count = 0;
                VadState::Quiet
            }
            (VadState::Speaking, true) => VadState::Speaking,
            (VadState::Speaking, false) => {
                self.count = 1;
                VadState::Stopping
            }
            (VadState::Stopping, true) => {
                self.count = 0;
                VadState::Speaking
            }
            (VadState::Stopping, false) => {
                self.count += 1;
                if self.count >= self.stop_frames {
                    self.count = 0;
                    VadState::Quiet
                } else {
                    VadState::Stopping
                }
            }
        };
        // Entering speaking/quiet from *any* other state fires the event,
        // including the stopping->speaking shortcut that skips `starting`.
        VadEvents {
            entered_speaking: self.state == VadState::Speaking && previous != VadState::Speaking,
            entered_quiet: self.state == VadState::Quiet && previous != VadState::Quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enters_speaking_only_after_start_frames_consecutive_true() {
        let mut vad = VadStateMachine::new(3, 3);
        assert!(!vad.observe(true).entered_speaking);
        assert!(!vad.observe(true).entered_speaking);
        assert!(vad.observe(true).entered_speaking);
        assert_eq!(vad.state(), VadState::Speaking);
    }

    #[test]
    fn false_during_starting_resets_to_quiet() {
        let mut vad = VadStateMachine::new(3, 3);
        vad.observe(true);
        vad.observe(true);
        let events = vad.observe(false);
        assert_eq!(vad.state(), VadState::Quiet);
        assert!(
            !events.entered_quiet,
            "quiet is the resting state, no event fires leaving starting early"
        );
    }

    #[test]
    fn enters_quiet_only_after_stop_frames_consecutive_false() {
        let mut vad = VadStateMachine::new(1, 3);
        vad.observe(true); // -> speaking
        assert_eq!(vad.state(), VadState::Speaking);
        assert!(!vad.observe(false).entered_quiet); // stopping, count=1
        assert!(!vad.observe(false).entered_quiet); // count=2
        assert!(vad.observe(false).entered_quiet); // count=3 -> quiet
    }

    #[test]
    fn resuming_speech_during_stopping_returns_to_speaking_and_refires_start() {
        let mut vad = VadStateMachine::new(1, 5);
        vad.observe(true); // -> speaking
        vad.observe(false); // -> stopping
        let events = vad.observe(true);
        assert_eq!(vad.state(), VadState::Speaking);
        assert!(events.entered_speaking);
    }

    #[test]
    fn frames_for_duration_matches_expected_window_count() {
        // 16kHz audio analyzed in 512-sample windows: ~31.25 windows/sec.
        let frames_per_sec = 16_000.0 / 512.0;
        assert_eq!(VadStateMachine::frames_for_duration(250, frames_per_sec), 8);
    }
}
