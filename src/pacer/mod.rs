//! Real-time output pacer: releases audio at wall-clock rate and infers
//! `bot-speech-start/stop` from send activity (spec §4.9).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::codec::FrameSerializer;
use crate::config::PacerConfig;
use crate::error::Result;
use crate::frame::types::AudioChunk;
use crate::frame::{Frame, FramePayload};
use crate::processor::command::{Command, WriteAudio};
use crate::processor::{Descriptor, Outputs, Phase, Processor, Workload};

/// A `now()` source, injected so `transform` stays deterministic under test
/// (spec §4.9 "Wall-clock reads are injected as `now`").
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// The real clock, backed by a monotonic process-local epoch.
pub struct SystemClock {
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

pub const AUDIO_WRITER_PORT: &str = "audio-writer";

/// Paces `audio-output-raw` frames to wall-clock speed and derives
/// `bot-speech-start/stop` observations (spec §4.9).
pub struct RealTimeOutputPacer {
    speaking: bool,
    last_send_ms: u64,
    sending_interval_ms: u64,
    silence_threshold_ms: u64,
    timer_period_ms: u64,
    serializer: Option<Arc<dyn FrameSerializer>>,
    clock: Box<dyn Clock>,
    timer_rx: Option<mpsc::Receiver<Frame>>,
}

impl RealTimeOutputPacer {
    pub fn new(config: &PacerConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock::default()))
    }

    pub fn with_clock(config: &PacerConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            speaking: false,
            last_send_ms: 0,
            sending_interval_ms: config.sending_interval_ms() as u64,
            silence_threshold_ms: config.silence_threshold_ms() as u64,
            timer_period_ms: config.chunk_duration_ms as u64,
            serializer: None,
            clock,
            timer_rx: None,
        }
    }

    pub fn set_serializer(&mut self, serializer: Arc<dyn FrameSerializer>) {
        self.serializer = Some(serializer);
    }

    fn on_audio_output(&mut self, chunk: AudioChunk, out: &mut Outputs) {
        if !self.speaking {
            out.emit(Frame::bot_speech_start(true));
            self.speaking = true;
        }
        let now = self.clock.now_ms();
        let next = now.max(self.last_send_ms + self.sending_interval_ms);
        self.last_send_ms = next;

        let frame = Frame::audio_output_raw(chunk.clone());
        let (data, sample_rate) = match self.serializer.as_ref().and_then(|s| s.serialize(&frame))
        {
            Some(serialized) => (serialized, chunk.sample_rate),
            None => (chunk.audio, chunk.sample_rate),
        };
        out.emit_command(
            AUDIO_WRITER_PORT,
            Command::write_audio(WriteAudio {
                data,
                delay_until_ms: next,
                sample_rate,
            }),
        );
    }

    fn on_timer_tick(&mut self, timestamp_ms: u64, out: &mut Outputs) {
        let silence = timestamp_ms.saturating_sub(self.last_send_ms);
        if self.speaking && silence > self.silence_threshold_ms {
            out.emit(Frame::bot_speech_stop(true));
            self.speaking = false;
        }
    }

    fn on_config_change(&mut self, patch: &crate::frame::types::ConfigPatch) {
        if patch.get("transport/serializer").is_some() {
            tracing::debug!("pacer config-change acknowledged; serializer installed out-of-band");
        }
    }
}

/// The underlying output line the audio-writer worker writes to: a speaker
/// device, a WebSocket frame sink, or anything else bytes-out (spec §3
/// "Ownership lifetimes" — exclusively owned by the pacer, opened lazily on
/// first write).
#[async_trait]
pub trait AudioSink: Send {
    async fn open(&mut self, sample_rate: u32) -> Result<()>;
    async fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// Consumes `WriteAudio` commands off the `audio-writer` port: sleeps until
/// `delay_until_ms` (relative to `clock`), then writes to `sink`, opening it
/// lazily on first use (spec §4.9).
pub async fn run_audio_writer_worker(
    mut rx: mpsc::Receiver<Command>,
    mut sink: Box<dyn AudioSink>,
    clock: Box<dyn Clock>,
) {
    let mut opened = false;
    while let Some(command) = rx.recv().await {
        let Command {
            kind: crate::processor::command::CommandKind::WriteAudio(write),
            ..
        } = command
        else {
            continue;
        };
        let now = clock.now_ms();
        if write.delay_until_ms > now {
            tokio::time::sleep(Duration::from_millis(write.delay_until_ms - now)).await;
        }
        if !opened {
            if let Err(err) = sink.open(write.sample_rate).await {
                tracing::warn!(%err, "audio sink open failed; retrying on next write");
                continue;
            }
            opened = true;
        }
        if let Err(err) = sink.write(&write.data).await {
            tracing::warn!(%err, "audio sink write failed");
        }
    }
}

#[async_trait]
impl Processor for RealTimeOutputPacer {
    fn describe(&self) -> Descriptor {
        Descriptor::new()
            .with_in("in", "audio-output-raw")
            .with_in("timer-in", "periodic timer-tick")
            .with_in("sys-in", "system-config-change (transport/serializer)")
            .with_out("out", "bot-speech-start/stop")
            .with_out(AUDIO_WRITER_PORT, "write-audio commands")
            .with_workload(Workload::Io)
    }

    async fn init(&mut self, _params: Value) -> Result<()> {
        let (tx, rx) = mpsc::channel(8);
        self.timer_rx = Some(rx);
        tokio::spawn(run_timer_worker(tx, Duration::from_millis(self.timer_period_ms.max(1))));
        Ok(())
    }

    async fn transition(&mut self, _phase: Phase) -> Result<()> {
        Ok(())
    }

    fn transform(&mut self, port: &str, frame: Frame) -> Outputs {
        let mut out = Outputs::new();
        match port {
            "in" => {
                if let FramePayload::AudioOutputRaw(chunk) = frame.payload {
                    self.on_audio_output(chunk, &mut out);
                }
            }
            "timer-in" => {
                // The worker's tick carries no useful timestamp of its own
                // (it only marks "time has passed"); read the pacer's own
                // clock so ticks and `on_audio_output`'s `last_send_ms`
                // always share one time base, real or fake.
                let now = self.clock.now_ms();
                self.on_timer_tick(now, &mut out);
            }
            "sys-in" => {
                if let FramePayload::SystemConfigChange(patch) = &frame.payload {
                    self.on_config_change(patch);
                }
            }
            _ => {}
        }
        out
    }

    fn extra_in_ports(&mut self) -> Vec<(String, mpsc::Receiver<Frame>)> {
        match self.timer_rx.take() {
            Some(rx) => vec![("timer-in".to_string(), rx)],
            None => Vec::new(),
        }
    }
}

/// Periodically injects a timer-tick frame into the pacer's `timer-in` port
/// (spec §4.9). Runs as an init-owned worker; exits when `tx` closes.
pub async fn run_timer_worker(tx: mpsc::Sender<Frame>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if tx.send(Frame::new(FramePayload::SystemStart)).await.is_err() {
            break;
        }
    }
}

/// The matching audio splitter (spec §4.9): divides a large
/// `audio-output-raw` into byte-exact `chunk_size` pieces.
pub struct AudioSplitter {
    chunk_size: usize,
}

impl AudioSplitter {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    /// `chunk-size = sample_rate * sample_size_bits/8 * channels * duration_ms/1000`.
    pub fn chunk_size_for(sample_rate: u32, sample_size_bits: u32, channels: u32, duration_ms: u32) -> usize {
        ((sample_rate as u64 * sample_size_bits as u64 / 8 * channels as u64 * duration_ms as u64)
            / 1000) as usize
    }

    /// Split `audio` into chunks of exactly `chunk_size` bytes, except
    /// possibly the last (spec §8 invariant 6).
    pub fn split(&self, chunk: &AudioChunk) -> Vec<AudioChunk> {
        chunk
            .audio
            .chunks(self.chunk_size)
            .map(|piece| AudioChunk {
                audio: piece.to_vec(),
                sample_rate: chunk.sample_rate,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FakeClock {
        ms: Rc<Cell<u64>>,
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.ms.get()
        }
    }

    fn pacer_with_clock(ms: u64) -> (RealTimeOutputPacer, Rc<Cell<u64>>) {
        let cell = Rc::new(Cell::new(ms));
        let clock = FakeClock { ms: cell.clone() };
        let config = PacerConfig::default();
        (
            RealTimeOutputPacer::with_clock(&config, Box::new(clock)),
            cell,
        )
    }

    fn audio_events(out: Outputs) -> Vec<&'static str> {
        out.into_vec()
            .into_iter()
            .filter_map(|(_, emission)| match emission {
                crate::processor::Emission::Frame(f) => match f.payload {
                    FramePayload::BotSpeechStart(_) => Some("start"),
                    FramePayload::BotSpeechStop(_) => Some("stop"),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_audio_chunk_emits_bot_speech_start() {
        let (mut pacer, _) = pacer_with_clock(0);
        let out = pacer.transform(
            "in",
            Frame::audio_output_raw(AudioChunk {
                audio: vec![0; 10],
                sample_rate: 16_000,
            }),
        );
        assert_eq!(audio_events(out), vec!["start"]);
    }

    #[test]
    fn second_audio_chunk_does_not_re_emit_start() {
        let (mut pacer, clock) = pacer_with_clock(0);
        pacer.transform(
            "in",
            Frame::audio_output_raw(AudioChunk {
                audio: vec![0; 10],
                sample_rate: 16_000,
            }),
        );
        clock.set(5);
        let out = pacer.transform(
            "in",
            Frame::audio_output_raw(AudioChunk {
                audio: vec![0; 10],
                sample_rate: 16_000,
            }),
        );
        assert!(audio_events(out).is_empty());
    }

    #[test]
    fn timer_tick_past_silence_threshold_emits_bot_speech_stop() {
        let (mut pacer, clock) = pacer_with_clock(0);
        pacer.transform(
            "in",
            Frame::audio_output_raw(AudioChunk {
                audio: vec![0; 10],
                sample_rate: 16_000,
            }),
        );
        clock.set(200);
        let tick = Frame::with_ts(
            FramePayload::SystemStart,
            crate::frame::Timestamp::from_millis(200),
        );
        let out = pacer.transform("timer-in", tick);
        assert_eq!(audio_events(out), vec!["stop"]);
    }

    #[test]
    fn start_stop_counts_balance_across_a_session() {
        let (mut pacer, clock) = pacer_with_clock(0);
        let mut starts = 0;
        let mut stops = 0;
        for _ in 0..3 {
            let out = pacer.transform(
                "in",
                Frame::audio_output_raw(AudioChunk {
                    audio: vec![0; 10],
                    sample_rate: 16_000,
                }),
            );
            for e in audio_events(out) {
                if e == "start" {
                    starts += 1;
                } else {
                    stops += 1;
                }
            }
            clock.set(clock.get() + 5);
        }
        clock.set(clock.get() + 1000);
        let tick = Frame::with_ts(
            FramePayload::SystemStart,
            crate::frame::Timestamp::from_millis(clock.get()),
        );
        for e in audio_events(pacer.transform("timer-in", tick)) {
            if e == "start" {
                starts += 1;
            } else {
                stops += 1;
            }
        }
        assert_eq!(starts, stops);
    }

    #[test]
    fn audio_splitter_chunk_size_from_sample_rate() {
        // 16kHz, 16-bit, mono, 20ms -> 16000*2*1*20/1000 = 640 bytes.
        assert_eq!(
            AudioSplitter::chunk_size_for(16_000, 16, 1, 20),
            640
        );
    }

    #[test]
    fn audio_splitter_splits_into_byte_exact_chunks_with_short_last() {
        let splitter = AudioSplitter::new(4);
        let chunk = AudioChunk {
            audio: vec![0, 1, 2, 3, 4, 5, 6, 7, 8],
            sample_rate: 16_000,
        };
        let pieces = splitter.split(&chunk);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].audio.len(), 4);
        assert_eq!(pieces[1].audio.len(), 4);
        assert_eq!(pieces[2].audio.len(), 1);
        let reassembled: Vec<u8> = pieces.iter().flat_map(|p| p.audio.clone()).collect();
        assert_eq!(reassembled, chunk.audio);
    }
}
