//! Configuration tree for the processor-and-frame dataflow substrate.
//!
//! Follows the teacher's `SpeechConfig` pattern: one struct per component,
//! `#[serde(default)]` throughout, and a hand-written `Default` impl per
//! struct carrying the numeric defaults spec.md calls out.

use serde::{Deserialize, Serialize};

/// Top-level configuration for a simulflow graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulflowConfig {
    pub vad: VadConfig,
    pub aggregator: AggregatorConfig,
    pub sentence_splitter: SentenceSplitterConfig,
    pub pacer: PacerConfig,
    pub activity_monitor: ActivityMonitorConfig,
    pub mute: MuteConfig,
    pub twilio_codec: TwilioCodecConfig,
    /// Mirrors `simulflow.frame.schema-checking` (spec §6): when set, frame
    /// constructors validate their payload shape against the closed
    /// taxonomy before the frame enters the graph.
    pub schema_checking: bool,
}

/// Voice-activity detection thresholds (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Minimum confidence `[0.0, 1.0]` for a window to count as speech.
    pub min_confidence: f32,
    /// Minimum duration of continuous speech before entering `speaking`.
    pub min_speech_ms: u32,
    /// Minimum duration of continuous silence before entering `quiet`.
    pub min_silence_ms: u32,
    /// Input sample rate; determines `frames-required` (512 @ 16kHz, 256 @ 8kHz).
    pub sample_rate: u32,
    /// Whether the pipeline supports barge-in (`bot-interrupt` ->
    /// `control-interrupt-start` translation, spec §4.4).
    pub interruption_supported: bool,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_speech_ms: 250,
            min_silence_ms: 800,
            sample_rate: 16_000,
            interruption_supported: true,
        }
    }
}

impl VadConfig {
    /// Analysis windows per second for the configured sample rate, given a
    /// 512-sample window at 16kHz (256 at 8kHz) per spec §4.3.
    pub fn frames_per_sec(&self) -> f64 {
        let window = if self.sample_rate <= 8_000 { 256.0 } else { 512.0 };
        self.sample_rate as f64 / window
    }

    pub fn start_frames(&self) -> u32 {
        crate::vad::VadStateMachine::frames_for_duration(self.min_speech_ms, self.frames_per_sec())
            .max(1)
    }

    pub fn stop_frames(&self) -> u32 {
        crate::vad::VadStateMachine::frames_for_duration(self.min_silence_ms, self.frames_per_sec())
            .max(1)
    }
}

/// User-turn aggregator configuration (spec §4.5). Currently parameter-free
/// beyond the initial context, which is supplied at graph-build time rather
/// than through config; kept as a struct for symmetry with its sibling
/// components and as an extension point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Bound on the tool-call dispatcher's write/read channels.
    pub tool_channel_capacity: usize,
}

/// Sentence-splitter configuration (spec §4.7). No tunables beyond the
/// built-in boundary rules today; reserved for future locale overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentenceSplitterConfig {}

/// Real-time output pacer configuration (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    /// Duration of one audio chunk in milliseconds.
    pub chunk_duration_ms: u32,
    /// Interval between successive chunk sends. `None` derives it from
    /// `chunk_duration_ms` via [`PacerConfig::sending_interval_ms`].
    pub sending_interval_ms: Option<u32>,
    /// Multiple of `chunk_duration_ms` of silence before emitting
    /// `bot-speech-stop` (spec §4.9 default `4 x chunk-duration-ms`).
    pub silence_threshold_chunks: u32,
    /// Output sink shape: affects the default `sending_interval_ms`.
    pub sink: PacerSink,
}

/// Which kind of output sink the pacer is feeding; the default
/// `sending_interval_ms` differs per spec §4.9 ("chunk/2 for the speakers
/// variant and chunk for network sinks").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacerSink {
    Speakers,
    Network,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            chunk_duration_ms: 20,
            sending_interval_ms: None,
            silence_threshold_chunks: 4,
            sink: PacerSink::Speakers,
        }
    }
}

impl PacerConfig {
    pub fn sending_interval_ms(&self) -> u32 {
        self.sending_interval_ms.unwrap_or(match self.sink {
            PacerSink::Speakers => self.chunk_duration_ms / 2,
            PacerSink::Network => self.chunk_duration_ms,
        })
    }

    pub fn silence_threshold_ms(&self) -> u32 {
        self.chunk_duration_ms * self.silence_threshold_chunks
    }
}

/// Activity monitor configuration (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityMonitorConfig {
    /// Idle-timer period in milliseconds.
    pub timeout_ms: u32,
    /// Ping count (including the final end-phrase) before the call ends.
    pub max_pings: u32,
    pub ping_phrases: Vec<String>,
    pub end_phrase: String,
}

impl Default for ActivityMonitorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_pings: 3,
            ping_phrases: vec!["Are you still there?".to_string()],
            end_phrase: "Goodbye!".to_string(),
        }
    }
}

/// Mute-filter configuration (spec §4.11): which strategies are active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MuteConfig {
    pub first_speech: bool,
    pub bot_speech: bool,
    pub tool_call: bool,
}

impl Default for MuteConfig {
    fn default() -> Self {
        Self {
            first_speech: true,
            bot_speech: false,
            tool_call: false,
        }
    }
}

/// Twilio Media Streams codec configuration (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioCodecConfig {
    /// Re-encode 16kHz PCM16 to 8kHz mu-law on the wire.
    pub convert_audio: bool,
}

impl Default for TwilioCodecConfig {
    fn default() -> Self {
        Self {
            convert_audio: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = SimulflowConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: SimulflowConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.vad.min_confidence, config.vad.min_confidence);
    }

    #[test]
    fn pacer_sending_interval_defaults_per_sink() {
        let speakers = PacerConfig {
            sink: PacerSink::Speakers,
            ..PacerConfig::default()
        };
        assert_eq!(speakers.sending_interval_ms(), 10);

        let network = PacerConfig {
            sink: PacerSink::Network,
            ..PacerConfig::default()
        };
        assert_eq!(network.sending_interval_ms(), 20);
    }

    #[test]
    fn pacer_silence_threshold_is_four_chunks_by_default() {
        let pacer = PacerConfig::default();
        assert_eq!(pacer.silence_threshold_ms(), 80);
    }

    #[test]
    fn vad_config_derives_frame_counts_from_durations() {
        let vad = VadConfig {
            min_speech_ms: 250,
            min_silence_ms: 800,
            sample_rate: 16_000,
            ..VadConfig::default()
        };
        // 16kHz / 512-sample windows ~= 31.25 windows/sec.
        assert_eq!(vad.start_frames(), 8);
        assert_eq!(vad.stop_frames(), 25);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let parsed: SimulflowConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(parsed.pacer.chunk_duration_ms, 20);
        assert!(parsed.mute.first_speech);
    }
}
