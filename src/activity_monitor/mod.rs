//! Activity monitor: idle-timeout pings, end-of-call after `max_pings`
//! (spec §4.10).
//!
//! Owns two ports beyond the usual `in`/`sys-in`: a `timer-in` channel fed
//! by speech events (to reset the idle countdown) and a `timer-out` channel
//! fed by an internal periodic timer. The timer itself lives in an
//! init-owned worker; `transform` only judges whether a ping is warranted,
//! matching the "periodic timer tick, transform judges" resolution spec §9
//! adopts for the source's ambiguous `alts!`-based idle loop.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{self, Duration};

use crate::error::Result;
use crate::frame::{Frame, FramePayload};
use crate::processor::{Descriptor, Outputs, Phase, Processor, Workload};

/// One internal timer tick; carries nothing, the transform reads current
/// state off `self`.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutTick;

pub struct ActivityMonitor {
    user_speaking: bool,
    bot_speaking: bool,
    ping_count: u32,
    max_pings: u32,
    ping_phrases: Vec<String>,
    end_phrase: String,
    timeout_ms: u32,
    /// Reset signal, sent to the worker to restart its idle countdown.
    timer_tx: Option<mpsc::Sender<Frame>>,
    /// Tick receiver, wired into the graph as the `timer-out` in-port.
    tick_rx: Option<mpsc::Receiver<Frame>>,
    alive: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl ActivityMonitor {
    pub fn new(timeout_ms: u32, max_pings: u32, ping_phrases: Vec<String>, end_phrase: String) -> Self {
        Self {
            user_speaking: false,
            bot_speaking: false,
            ping_count: 0,
            max_pings: max_pings.max(1),
            ping_phrases,
            end_phrase,
            timeout_ms,
            timer_tx: None,
            tick_rx: None,
            alive: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true)),
        }
    }

    /// Resets the worker's idle countdown. Best-effort: a full channel (the
    /// worker is mid-tick) or a not-yet-`init`ed monitor silently no-ops.
    fn notify_timer(&self, frame: Frame) {
        if let Some(tx) = &self.timer_tx {
            let _ = tx.try_send(frame);
        }
    }

    fn pick_ping(&self) -> String {
        self.ping_phrases
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| self.end_phrase.clone())
    }
}

#[async_trait]
impl Processor for ActivityMonitor {
    fn describe(&self) -> Descriptor {
        Descriptor::new()
            .with_in("in", "user/bot speech-start/stop frames")
            .with_in("timer-out", "periodic idle-timer ticks")
            .with_out("timer-in", "speech events, to reset the idle countdown")
            .with_out("out", "speak-frame pings / end-phrase")
            .with_param("timeout-ms", "idle-timer period before a ping is considered")
            .with_param("max-pings", "ping count (including the end phrase) before call end")
            .with_workload(Workload::Io)
    }

    async fn init(&mut self, params: Value) -> Result<()> {
        if let Some(ms) = params.get("timeout-ms").and_then(Value::as_u64) {
            self.timeout_ms = ms as u32;
        }
        if let Some(n) = params.get("max-pings").and_then(Value::as_u64) {
            self.max_pings = (n as u32).max(1);
        }
        let (reset_tx, mut reset_rx) = mpsc::channel::<Frame>(8);
        let (tick_tx, tick_rx) = mpsc::channel::<Frame>(8);
        self.timer_tx = Some(reset_tx);
        self.tick_rx = Some(tick_rx);
        let alive = self.alive.clone();
        let timeout_ms = self.timeout_ms.max(1) as u64;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = time::sleep(Duration::from_millis(timeout_ms)) => {
                        if !alive.load(std::sync::atomic::Ordering::Acquire) {
                            break;
                        }
                        if tick_tx.send(Frame::system_start()).await.is_err() {
                            break;
                        }
                    }
                    frame = reset_rx.recv() => {
                        if frame.is_none() {
                            break;
                        }
                        // A speech event reset the countdown; loop back to sleep.
                    }
                }
                if !alive.load(std::sync::atomic::Ordering::Acquire) {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn transition(&mut self, phase: Phase) -> Result<()> {
        if phase == Phase::Stop {
            self.alive.store(false, std::sync::atomic::Ordering::Release);
            self.timer_tx = None;
        }
        Ok(())
    }

    fn transform(&mut self, port: &str, frame: Frame) -> Outputs {
        let mut out = Outputs::new();
        match port {
            "in" => match &frame.payload {
                FramePayload::UserSpeechStart(_) => {
                    self.user_speaking = true;
                    self.notify_timer(frame.clone());
                    out.emit_on("timer-in", frame);
                }
                FramePayload::UserSpeechStop(_) => {
                    self.user_speaking = false;
                    self.notify_timer(frame.clone());
                    out.emit_on("timer-in", frame);
                }
                FramePayload::BotSpeechStart(_) => {
                    self.bot_speaking = true;
                    self.notify_timer(frame.clone());
                    out.emit_on("timer-in", frame);
                }
                FramePayload::BotSpeechStop(_) => {
                    self.bot_speaking = false;
                    self.notify_timer(frame.clone());
                    out.emit_on("timer-in", frame);
                }
                _ => {}
            },
            "timer-out" => {
                if self.user_speaking || self.bot_speaking {
                    // Someone is speaking: the idle window doesn't apply.
                } else if self.ping_count + 1 < self.max_pings {
                    self.ping_count += 1;
                    out.emit(Frame::speak_frame(self.pick_ping()));
                } else {
                    self.ping_count = 0;
                    out.emit(Frame::speak_frame(self.end_phrase.clone()));
                }
            }
            _ => {}
        }
        out
    }

    fn extra_in_ports(&mut self) -> Vec<(String, mpsc::Receiver<Frame>)> {
        match self.tick_rx.take() {
            Some(rx) => vec![("timer-out".to_string(), rx)],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FramePayload;

    fn speak_text(frame: &Frame) -> &str {
        match &frame.payload {
            FramePayload::SpeakFrame(s) => s,
            other => panic!("expected speak-frame, got {other:?}"),
        }
    }

    #[test]
    fn pings_then_ends_and_resets_count() {
        let mut monitor = ActivityMonitor::new(
            10_000,
            3,
            vec!["Are you still there?".to_string()],
            "Goodbye!".to_string(),
        );

        let first = monitor.transform("timer-out", Frame::system_start());
        let items = first.into_vec();
        assert_eq!(items.len(), 1);
        let crate::processor::Emission::Frame(f) = &items[0].1 else {
            panic!("expected a frame");
        };
        assert_eq!(speak_text(f), "Are you still there?");

        let second = monitor.transform("timer-out", Frame::system_start());
        let items = second.into_vec();
        let crate::processor::Emission::Frame(f) = &items[0].1 else {
            panic!("expected a frame");
        };
        assert_eq!(speak_text(f), "Are you still there?");

        let third = monitor.transform("timer-out", Frame::system_start());
        let items = third.into_vec();
        let crate::processor::Emission::Frame(f) = &items[0].1 else {
            panic!("expected a frame");
        };
        assert_eq!(speak_text(f), "Goodbye!");
        assert_eq!(monitor.ping_count, 0);
    }

    #[test]
    fn does_nothing_while_someone_is_speaking() {
        let mut monitor = ActivityMonitor::new(10_000, 3, vec!["hi?".to_string()], "bye".to_string());
        monitor.transform("in", Frame::user_speech_start(true));
        let out = monitor.transform("timer-out", Frame::system_start());
        assert!(out.into_vec().is_empty()); // user still speaking, no ping emitted
    }

    #[test]
    fn speech_events_forward_to_timer_in_to_reset_countdown() {
        let mut monitor = ActivityMonitor::new(10_000, 3, vec!["hi?".to_string()], "bye".to_string());
        let out = monitor.transform("in", Frame::bot_speech_start(true));
        let items = out.into_vec();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, "timer-in");
    }
}
